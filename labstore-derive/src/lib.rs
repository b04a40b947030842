use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod generator;
mod schema;

use generator::generate_record_impl;
use schema::Schema;

/// Derives `labstore::Record` for a struct with named fields.
///
/// The struct needs a `#[kind(Variant)]` attribute naming its `labstore::RecordKind`
/// and exactly one `String` field marked `#[id]`. A `{Name}Field` enum with one
/// variant per field is generated alongside, used to build typed queries.
#[proc_macro_derive(Record, attributes(kind, id))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match Schema::from_derive_input(input) {
        Ok(schema) => generate_record_impl(&schema).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
