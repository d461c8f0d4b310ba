//! Procedural macros for Sona builtin functions.
//!
//! Provides the `#[builtin]` attribute for defining natives with rustdoc-style
//! documentation that doubles as host-visible help text.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, ItemFn, Meta};

#[derive(Debug, Clone)]
struct DocMarkdown {
    summary: String,
    examples: Vec<String>,
    see_also: Vec<String>,
}

fn extract_doc_comments(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let Meta::NameValue(nv) = &attr.meta {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit_str),
                        ..
                    }) = &nv.value
                    {
                        return Some(lit_str.value());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_doc_markdown(raw_doc: &str) -> DocMarkdown {
    let mut summary = String::new();
    let mut examples = Vec::new();
    let mut see_also = Vec::new();
    let mut current_section = "summary";
    let mut current_content = String::new();

    let mut flush = |section: &str, content: &str, summary: &mut String, examples: &mut Vec<String>, see_also: &mut Vec<String>| {
        match section {
            "summary" => *summary = content.trim().to_string(),
            "examples" => {
                for block in content.split("```") {
                    let trimmed = block.trim();
                    if let Some(code) = trimmed.strip_prefix("sona") {
                        let code = code.trim().to_string();
                        if !code.is_empty() {
                            examples.push(code);
                        }
                    }
                }
            }
            "see also" => {
                *see_also = content
                    .trim()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => {}
        }
    };

    for line in raw_doc.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("# ") {
            flush(current_section, &current_content, &mut summary, &mut examples, &mut see_also);
            let header = rest.trim().to_lowercase();
            current_section = if header.contains("example") {
                "examples"
            } else if header.contains("see") || header.contains("related") {
                "see also"
            } else {
                "other"
            };
            current_content.clear();
        } else {
            current_content.push_str(line);
            current_content.push('\n');
        }
    }
    flush(current_section, &current_content, &mut summary, &mut examples, &mut see_also);

    DocMarkdown {
        summary,
        examples,
        see_also,
    }
}

/// Parse `name = "..."`, `category = "..."`, `arity = N`, `related(...)` from
/// the attribute tokens.
fn parse_builtin_args(attr_stream: TokenStream) -> (String, String, Option<usize>, Vec<String>) {
    let attr_str = attr_stream.to_string();
    let mut name = String::new();
    let mut category = String::new();
    let mut arity = None;
    let mut related = Vec::new();

    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }
    if let Some(start) = attr_str.find("category = \"") {
        let rest = &attr_str[start + 12..];
        if let Some(end) = rest.find('"') {
            category = rest[..end].to_string();
        }
    }
    if let Some(start) = attr_str.find("arity = ") {
        let rest = &attr_str[start + 8..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        arity = digits.parse().ok();
    }
    if let Some(start) = attr_str.find("related") {
        let rest = &attr_str[start..];
        if let (Some(paren_start), Some(paren_end)) = (rest.find('('), rest.find(')')) {
            related = rest[paren_start + 1..paren_end]
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    (name, category, arity, related)
}

/// Attribute macro for defining Sona builtin functions.
///
/// Extracts rustdoc comments and generates a companion `register_*` function
/// that binds the native into an environment and records its help entry.
///
/// # Attribute arguments
///
/// - `name`: the Sona-visible name (e.g. `"len"`)
/// - `category`: help category (e.g. `"iter"`)
/// - `related`: related builtin names to cross-link in help output
#[proc_macro_attribute]
pub fn builtin(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let (sona_name, category, arity, related) = parse_builtin_args(attr);
    let fn_name = func.sig.ident.clone();
    let fn_ident_str = fn_name.to_string();

    let name_to_use = if !sona_name.is_empty() {
        sona_name
    } else {
        fn_ident_str.clone()
    };

    let raw_docs = extract_doc_comments(&func.attrs);
    let parsed_docs = parse_doc_markdown(&raw_docs);
    let description = parsed_docs.summary;
    let examples = parsed_docs.examples;
    let related_vec = if related.is_empty() {
        parsed_docs.see_also
    } else {
        related
    };
    let cat_to_use = if !category.is_empty() {
        category
    } else {
        "other".to_string()
    };

    let register_fn_name = quote::format_ident!("register_{}", fn_name);
    let signature = format!("{}(...)", name_to_use);
    let arity_tokens = match arity {
        Some(n) => quote! { Some(#n) },
        None => quote! { None },
    };

    let expanded = quote! {
        #func

        #[allow(dead_code)]
        pub fn #register_fn_name(env: &std::rc::Rc<crate::env::Environment>) {
            env.define(
                #name_to_use.to_string(),
                crate::value::Value::Native(std::rc::Rc::new(crate::value::Native {
                    name: #name_to_use.to_string(),
                    arity: #arity_tokens,
                    func: std::rc::Rc::new(#fn_name),
                })),
            );
            crate::help::register_help(crate::help::HelpEntry {
                name: #name_to_use.to_string(),
                signature: #signature.to_string(),
                description: #description.to_string(),
                examples: vec![#(#examples.to_string()),*],
                related: vec![#(#related_vec.to_string()),*],
                category: #cat_to_use.to_string(),
            });
        }
    };

    TokenStream::from(expanded)
}
