use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;

use crate::schema::Schema;

pub fn generate_record_impl(schema: &Schema) -> TokenStream {
    let name = &schema.name;
    let kind = &schema.kind;
    let id_field = &schema.id_field;
    let (impl_generics, ty_generics, where_clause) = schema.generics.split_for_impl();

    let field_enum = syn::Ident::new(&format!("{name}Field"), name.span());

    let variants: Vec<_> = schema
        .fields
        .iter()
        .map(|field| syn::Ident::new(&field.name.to_case(Case::Pascal), field.ident.span()))
        .collect();
    // Document field names follow `#[serde(rename_all = "camelCase")]`.
    let document_names: Vec<_> = schema
        .fields
        .iter()
        .map(|field| field.name.to_case(Case::Camel))
        .collect();

    let expanded = quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum #field_enum {
            #(#variants),*
        }

        impl labstore::RecordField for #field_enum {
            fn name(self) -> &'static str {
                match self {
                    #(Self::#variants => #document_names),*
                }
            }
        }

        impl #impl_generics labstore::Record for #name #ty_generics #where_clause {
            const KIND: labstore::RecordKind = labstore::RecordKind::#kind;
            type Field = #field_enum;

            fn id(&self) -> &str {
                &self.#id_field
            }
        }
    };

    expanded
}
