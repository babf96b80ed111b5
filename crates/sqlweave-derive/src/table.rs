//! Table derive macro implementation

use std::collections::HashSet;

use heck::ToShoutySnakeCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

use crate::sql_ident::{parse_column_name, parse_table_name};

struct ColumnField {
    ident: syn::Ident,
    column: String,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let table = get_table_name(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Table can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Table can only be derived for structs",
            ));
        }
    };

    let mut columns: Vec<ColumnField> = Vec::with_capacity(fields.len());
    let mut seen = HashSet::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let Some(column) = get_column(field, &ident)? else {
            continue;
        };
        if !seen.insert(column.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column '{column}'"),
            ));
        }
        columns.push(ColumnField { ident, column });
    }

    let column_names: Vec<&str> = columns.iter().map(|c| c.column.as_str()).collect();
    let handles = columns.iter().map(|c| {
        let const_name = format_ident!(
            "COL_{}",
            c.ident.unraw().to_string().to_shouty_snake_case()
        );
        let column = &c.column;
        let doc = format!("`{table}.{column}`");
        quote! {
            #[doc = #doc]
            pub const #const_name: sqlweave::Column = sqlweave::Column::new(#table, #column);
        }
    });

    Ok(quote! {
        impl #impl_generics sqlweave::Table for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const COLUMNS: &'static [&'static str] = &[#(#column_names),*];
        }

        impl #impl_generics #name #ty_generics #where_clause {
            #(#handles)*
        }
    })
}

/// Extract the table name from `#[sqlweave(table = "...")]`.
fn get_table_name(input: &DeriveInput) -> Result<String> {
    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("sqlweave") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                table = Some(parse_table_name(&lit.value(), lit.span())?);
                Ok(())
            } else {
                Err(meta.error("unknown struct attribute; expected `table`"))
            }
        })?;
    }
    table.ok_or_else(|| {
        syn::Error::new_spanned(
            input,
            "Table requires #[sqlweave(table = \"table_name\")] attribute",
        )
    })
}

/// Column name for a field, or `None` when the field is skipped.
fn get_column(field: &syn::Field, ident: &syn::Ident) -> Result<Option<String>> {
    let mut column = None;
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("sqlweave") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                column = Some(parse_column_name(&lit.value(), lit.span())?);
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown field attribute; expected `column` or `skip`"))
            }
        })?;
    }
    if skip {
        return Ok(None);
    }
    match column {
        Some(column) => Ok(Some(column)),
        None => parse_column_name(&ident.unraw().to_string(), ident.span()).map(Some),
    }
}
