extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error, Field, Fields};

enum FieldCodec {
    Plain,
    VarInt,
    Skip,
}

fn field_codec(field: &Field) -> syn::Result<FieldCodec> {
    let mut codec = FieldCodec::Plain;
    for attr in &field.attrs {
        let next = if attr.path().is_ident("varint") {
            FieldCodec::VarInt
        } else if attr.path().is_ident("skip") {
            FieldCodec::Skip
        } else {
            continue;
        };
        if !matches!(codec, FieldCodec::Plain) {
            return Err(Error::new_spanned(
                attr,
                "`varint` and `skip` are mutually exclusive",
            ));
        }
        codec = next;
    }
    Ok(codec)
}

/// Derives `bitcoin::consensus::{Encodable, Decodable}` for a struct with named
/// fields. Fields are written in declaration order.
///
/// * `#[varint]` writes an unsigned integer field as a `pricefeed_tx::common::VarInt`.
/// * `#[skip]` leaves a field off the wire and restores it with `Default::default()`.
#[proc_macro_derive(ConsensusEncoding, attributes(varint, skip))]
pub fn consensus_encoding_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_consensus_encoding(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_consensus_encoding(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new_spanned(
                    name,
                    "ConsensusEncoding requires named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                name,
                "ConsensusEncoding can only be derived for structs",
            ))
        }
    };

    let mut encode_steps = Vec::new();
    let mut decode_steps = Vec::new();
    let mut field_names = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "unnamed field"))?;
        let ty = &field.ty;
        field_names.push(ident);

        match field_codec(field)? {
            FieldCodec::Plain => {
                encode_steps.push(quote! {
                    len += ::bitcoin::consensus::Encodable::consensus_encode(&self.#ident, w)?;
                });
                decode_steps.push(quote! {
                    let #ident: #ty = ::bitcoin::consensus::Decodable::consensus_decode(r)?;
                });
            }
            FieldCodec::VarInt => {
                encode_steps.push(quote! {
                    len += ::bitcoin::consensus::Encodable::consensus_encode(
                        &::pricefeed_tx::common::VarInt(::core::primitive::u64::from(self.#ident)),
                        w,
                    )?;
                });
                decode_steps.push(quote! {
                    let #ident: #ty = ::core::convert::TryFrom::try_from(
                        <::pricefeed_tx::common::VarInt as ::bitcoin::consensus::Decodable>::consensus_decode(r)?.0,
                    )
                    .map_err(|_| ::bitcoin::consensus::encode::Error::ParseFailed(
                        "VarInt out of range for field",
                    ))?;
                });
            }
            FieldCodec::Skip => {
                decode_steps.push(quote! {
                    let #ident: #ty = ::core::default::Default::default();
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::bitcoin::consensus::Encodable for #name #ty_generics #where_clause {
            fn consensus_encode<W: ::std::io::Write + ?Sized>(
                &self,
                w: &mut W,
            ) -> ::std::result::Result<usize, ::std::io::Error> {
                let mut len = 0usize;
                #(#encode_steps)*
                Ok(len)
            }
        }

        impl #impl_generics ::bitcoin::consensus::Decodable for #name #ty_generics #where_clause {
            fn consensus_decode<R: ::std::io::Read + ?Sized>(
                r: &mut R,
            ) -> ::std::result::Result<Self, ::bitcoin::consensus::encode::Error> {
                #(#decode_steps)*
                Ok(Self {
                    #(#field_names),*
                })
            }
        }
    })
}
