// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Derive macro for `treejson::tree::TreeNode`.
//!
//! Structs with named fields become node kinds, with fields emitted in
//! declaration order. Enums dispatch on the variant: unit and struct
//! variants become node kinds, single-field tuple variants are
//! transparent and delegate to the wrapped type.
//!
//! The `#[tree(rename = "...")]` attribute overrides the name of a
//! struct, variant or field; `#[tree(skip)]` leaves a field out.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse_macro_input;
use syn::spanned::Spanned;

/// Options given with `#[tree(...)]`.
#[derive(Default)]
struct TreeAttrs {
    rename: Option<syn::LitStr>,
    skip: Option<proc_macro2::Span>,
}

fn parse_attrs(attrs: &[syn::Attribute]) -> syn::Result<TreeAttrs> {
    let mut options = TreeAttrs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("tree")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                options.rename = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("skip") {
                options.skip = Some(meta.path.span());
                Ok(())
            } else {
                Err(meta.error("unsupported tree attribute, expected `rename` or `skip`"))
            }
        })?;
    }
    Ok(options)
}

/// Reject `#[tree(skip)]` where it has no meaning.
fn no_skip(options: &TreeAttrs) -> syn::Result<()> {
    match options.skip {
        Some(span) => Err(syn::Error::new(span, "`skip` is only supported on fields")),
        None => Ok(()),
    }
}

fn name_of(ident: &syn::Ident, options: &TreeAttrs) -> String {
    options.rename.as_ref().map_or_else(|| ident.to_string(), syn::LitStr::value)
}

/// Named field kept in the node.
struct NodeField<'a> {
    ident: &'a syn::Ident,
    name: String,
    ty: &'a syn::Type,
}

fn node_fields(fields: &syn::FieldsNamed) -> syn::Result<Vec<NodeField<'_>>> {
    let mut result = vec![];
    for field in &fields.named {
        let options = parse_attrs(&field.attrs)?;
        if options.skip.is_some() {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new(field.span(), "expected a named field"));
        };
        result.push(NodeField { ident, name: name_of(ident, &options), ty: &field.ty });
    }
    Ok(result)
}

/// Statements declaring the node kind `kind` and the types of its
/// fields.
fn declare_node(kind: &str, fields: &[NodeField]) -> TokenStream {
    let names = fields.iter().map(|field| &field.name);
    let types = fields.iter().map(|field| field.ty).collect::<Vec<_>>();
    quote! {
        registry.declare(
            ::treejson::registry::NodeType::new(#kind)
            #(.with_field(#names, <#types as ::treejson::tree::TreeNode>::QUANTIFIER))*
        )?;
        #(<#types as ::treejson::tree::TreeNode>::declare(registry)?;)*
    }
}

/// Expression building the node `kind` from field bindings.
fn build_node(kind: &str, fields: &[NodeField], bindings: &[TokenStream]) -> TokenStream {
    let names = fields.iter().map(|field| &field.name);
    quote! {
        ::treejson::tree::Value::Node(
            ::treejson::tree::Node::new(#kind)
            #(.with(#names, ::treejson::tree::TreeNode::to_tree(#bindings)))*
        )
    }
}

/// Generated `declare` and `to_tree` bodies.
struct Bodies {
    declare: TokenStream,
    to_tree: TokenStream,
}

fn derive_struct(input: &syn::DeriveInput, data: &syn::DataStruct) -> syn::Result<Bodies> {
    let options = parse_attrs(&input.attrs)?;
    no_skip(&options)?;
    let kind = name_of(&input.ident, &options);
    match &data.fields {
        syn::Fields::Named(named) => {
            let fields = node_fields(named)?;
            let bindings: Vec<_> = fields
                .iter()
                .map(|field| {
                    let ident = field.ident;
                    quote! { &self.#ident }
                })
                .collect();
            Ok(Bodies {
                declare: declare_node(&kind, &fields),
                to_tree: build_node(&kind, &fields, &bindings),
            })
        }
        syn::Fields::Unit => Ok(Bodies {
            declare: declare_node(&kind, &[]),
            to_tree: build_node(&kind, &[], &[]),
        }),
        syn::Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 && options.rename.is_none() => {
            let ty = &unnamed.unnamed[0].ty;
            Ok(Bodies {
                declare: quote! { <#ty as ::treejson::tree::TreeNode>::declare(registry)?; },
                to_tree: quote! { ::treejson::tree::TreeNode::to_tree(&self.0) },
            })
        }
        syn::Fields::Unnamed(unnamed) => Err(syn::Error::new(
            unnamed.span(),
            "tuple structs must wrap exactly one field, without `rename`",
        )),
    }
}

fn derive_enum(input: &syn::DeriveInput, data: &syn::DataEnum) -> syn::Result<Bodies> {
    let options = parse_attrs(&input.attrs)?;
    if let Some(rename) = &options.rename {
        return Err(syn::Error::new(rename.span(), "`rename` is not supported on enums"));
    }
    no_skip(&options)?;

    let mut declare = vec![];
    let mut arms = vec![];
    for variant in &data.variants {
        let options = parse_attrs(&variant.attrs)?;
        no_skip(&options)?;
        let ident = &variant.ident;
        let kind = name_of(ident, &options);
        match &variant.fields {
            syn::Fields::Named(named) => {
                let fields = node_fields(named)?;
                let idents: Vec<_> = fields.iter().map(|field| field.ident).collect();
                let bindings: Vec<_> = idents.iter().map(|ident| quote! { #ident }).collect();
                let node = build_node(&kind, &fields, &bindings);
                declare.push(declare_node(&kind, &fields));
                arms.push(quote! { Self::#ident { #(#idents,)* .. } => #node, });
            }
            syn::Fields::Unit => {
                let node = build_node(&kind, &[], &[]);
                declare.push(declare_node(&kind, &[]));
                arms.push(quote! { Self::#ident => #node, });
            }
            syn::Fields::Unnamed(unnamed)
                if unnamed.unnamed.len() == 1 && options.rename.is_none() =>
            {
                let ty = &unnamed.unnamed[0].ty;
                declare.push(quote! { <#ty as ::treejson::tree::TreeNode>::declare(registry)?; });
                arms.push(quote! {
                    Self::#ident(inner) => ::treejson::tree::TreeNode::to_tree(inner),
                });
            }
            syn::Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new(
                    unnamed.span(),
                    "tuple variants must wrap exactly one field, without `rename`",
                ))
            }
        }
    }

    Ok(Bodies {
        declare: quote! { #(#declare)* },
        to_tree: quote! {
            match self {
                #(#arms)*
            }
        },
    })
}

fn tree_node_derive(input: syn::DeriveInput) -> syn::Result<TokenStream> {
    let Bodies { declare, to_tree } = match &input.data {
        syn::Data::Struct(data) => derive_struct(&input, data)?,
        syn::Data::Enum(data) => derive_enum(&input, data)?,
        syn::Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span,
                "TreeNode cannot be derived for unions",
            ))
        }
    };

    let ident = &input.ident;
    let mut generics = input.generics.clone();
    let type_params: Vec<_> = generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in type_params {
        where_clause.predicates.push(syn::parse_quote! { #param: ::treejson::tree::TreeNode });
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::treejson::tree::TreeNode for #ident #ty_generics #where_clause {
            fn declare(
                registry: &mut ::treejson::registry::RegistryBuilder,
            ) -> ::std::result::Result<(), ::treejson::registry::RegistryError> {
                if !registry.visit(::std::any::type_name::<Self>()) {
                    return ::std::result::Result::Ok(());
                }
                #declare
                ::std::result::Result::Ok(())
            }

            fn to_tree(&self) -> ::treejson::tree::Value {
                #to_tree
            }
        }
    })
}

/// Derive `treejson::tree::TreeNode`.
#[proc_macro_derive(TreeNode, attributes(tree))]
pub fn tree_node(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    tree_node_derive(input).unwrap_or_else(syn::Error::into_compile_error).into()
}
