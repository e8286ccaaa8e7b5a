use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Ident, Lit, LitStr, Type, UnOp,
    parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(Trackable, attributes(entity, association, tracked))]
pub fn derive_trackable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_trackable(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct EntityOptions {
    class: Option<String>,
    parents: Vec<String>,
    notify: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TrackOn {
    Create,
    Update,
    Change,
}

struct TrackedOptions {
    behavior: String,
    on: TrackOn,
    tracked_fields: Vec<String>,
    values: Vec<TokenStream2>,
}

struct MappedField {
    ident: Ident,
    name: String,
    ty: Type,
    association: Option<String>,
    tracked: Vec<TrackedOptions>,
}

fn expand_trackable(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Trackable does not support generic structs",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;
    let class = options.class.unwrap_or_else(|| struct_name.to_string());

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Trackable can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Trackable requires named fields",
            ));
        }
    };

    let mut fields = Vec::<MappedField>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Trackable requires named fields"))?;
        let name = ident.to_string().trim_start_matches("r#").to_string();
        fields.push(MappedField {
            association: parse_association(&field.attrs)?,
            tracked: parse_tracked(&field.attrs)?,
            ident,
            name,
            ty: field.ty,
        });
    }

    let tracked_object = expand_tracked_object(&struct_name, &class, options.notify, &fields);
    let entity = expand_entity(&struct_name, &class, &options.parents, &fields);

    Ok(quote! {
        #tracked_object
        #entity
    })
}

fn expand_tracked_object(
    struct_name: &Ident,
    class: &str,
    notify: bool,
    fields: &[MappedField],
) -> TokenStream2 {
    let names = fields.iter().map(|field| &field.name).collect::<Vec<_>>();
    let idents = fields.iter().map(|field| &field.ident).collect::<Vec<_>>();
    let types = fields.iter().map(|field| &field.ty).collect::<Vec<_>>();

    let policy = if notify {
        quote!(::entity_tracking::ChangeTrackingPolicy::Notify)
    } else {
        quote!(::entity_tracking::ChangeTrackingPolicy::DeferredImplicit)
    };

    quote! {
        impl ::entity_tracking::TrackedObject for #struct_name {
            fn class_name(&self) -> &str {
                #class
            }

            fn get_field(&self, field: &str) -> ::entity_tracking::Result<::entity_tracking::Value> {
                match field {
                    #(#names => Ok(::entity_tracking::FieldValue::to_value(&self.#idents)),)*
                    _ => Err(::entity_tracking::BehaviorError::FieldNotFound(
                        field.to_string(),
                        #class.to_string(),
                    )),
                }
            }

            fn set_field(
                &mut self,
                field: &str,
                value: ::entity_tracking::Value,
            ) -> ::entity_tracking::Result<()> {
                match field {
                    #(#names => {
                        self.#idents = <#types as ::entity_tracking::FieldValue>::from_value(value)?;
                        Ok(())
                    })*
                    _ => Err(::entity_tracking::BehaviorError::FieldNotFound(
                        field.to_string(),
                        #class.to_string(),
                    )),
                }
            }

            fn change_tracking_policy(&self) -> ::entity_tracking::ChangeTrackingPolicy {
                #policy
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    }
}

fn expand_entity(
    struct_name: &Ident,
    class: &str,
    parents: &[String],
    fields: &[MappedField],
) -> TokenStream2 {
    let mappings = fields.iter().map(|field| {
        let name = &field.name;
        let ty = &field.ty;
        match &field.association {
            Some(target) => quote! {
                meta.add_mapping(::entity_tracking::FieldMapping::association(
                    #name,
                    #target,
                    ::entity_tracking::AssociationKind::ToOne,
                ));
            },
            None => quote! {
                meta.add_mapping(::entity_tracking::FieldMapping::scalar(
                    #name,
                    <#ty as ::entity_tracking::ScalarField>::FIELD_TYPE,
                ));
            },
        }
    });

    // behaviors in declaration order
    let mut behaviors = Vec::<(String, Vec<TokenStream2>)>::new();
    for field in fields {
        for tracked in &field.tracked {
            let statement = behavior_statement(&field.name, tracked);
            match behaviors
                .iter_mut()
                .find(|(behavior, _)| *behavior == tracked.behavior)
            {
                Some((_, statements)) => statements.push(statement),
                None => behaviors.push((tracked.behavior.clone(), vec![statement])),
            }
        }
    }
    let behavior_blocks = behaviors.iter().map(|(behavior, statements)| {
        quote! {
            {
                let mut config = ::entity_tracking::BehaviorConfig::new();
                #(#statements)*
                mappings.push((#behavior, config));
            }
        }
    });

    quote! {
        impl ::entity_tracking::Entity for #struct_name {
            fn entity_class() -> &'static str {
                #class
            }

            fn class_metadata() -> ::entity_tracking::ClassMetadata {
                let mut meta = ::entity_tracking::ClassMetadata::new(#class)
                    #(.extends(#parents))*;
                #(#mappings)*
                meta
            }

            fn behavior_mappings() -> ::std::vec::Vec<(&'static str, ::entity_tracking::BehaviorConfig)> {
                let mut mappings = ::std::vec::Vec::new();
                #(#behavior_blocks)*
                mappings
            }
        }
    }
}

fn behavior_statement(name: &str, tracked: &TrackedOptions) -> TokenStream2 {
    match tracked.on {
        TrackOn::Create => quote!(config.add_create(#name);),
        TrackOn::Update => quote!(config.add_update(#name);),
        TrackOn::Change => {
            let tracked_field = match tracked.tracked_fields.as_slice() {
                [single] => quote!(#single),
                many => quote!(::entity_tracking::TrackedField::many([#(#many),*])),
            };
            let values = &tracked.values;
            let when = if values.is_empty() {
                quote!()
            } else {
                quote!(.when([#(#values),*]))
            };
            quote! {
                config.add_change(::entity_tracking::ChangeRule::new(#name, #tracked_field)#when);
            }
        }
    }
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions {
        class: None,
        parents: Vec::new(),
        notify: false,
    };

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.class = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("extends") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.parents.push(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("notify") {
                options.notify = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[entity(...)] option. Supported: class = \"...\", extends = \"...\", notify",
            ))
        })?;
    }

    Ok(options)
}

fn parse_association(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut target: Option<String> = None;

    for attr in attrs {
        if !attr.path().is_ident("association") {
            continue;
        }

        if target.is_some() {
            return Err(syn::Error::new(
                attr.span(),
                "Duplicate #[association(...)] attribute on field",
            ));
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("target") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                target = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported #[association(...)] option. Supported: target = \"...\""))
        })?;

        if target.is_none() {
            return Err(syn::Error::new(
                attr.span(),
                "#[association(...)] requires target = \"...\"",
            ));
        }
    }

    Ok(target)
}

fn parse_tracked(attrs: &[syn::Attribute]) -> syn::Result<Vec<TrackedOptions>> {
    let mut tracked = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("tracked") {
            continue;
        }

        let mut behavior: Option<String> = None;
        let mut on: Option<TrackOn> = None;
        let mut tracked_fields = Vec::new();
        let mut values = Vec::new();

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("behavior") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                behavior = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("on") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                on = Some(match lit.value().as_str() {
                    "create" => TrackOn::Create,
                    "update" => TrackOn::Update,
                    "change" => TrackOn::Change,
                    other => {
                        return Err(syn::Error::new(
                            lit.span(),
                            format!("Unknown tracking event \"{other}\". Supported: create, update, change"),
                        ));
                    }
                });
                return Ok(());
            }

            if meta.path.is_ident("field") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                tracked_fields.push(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("value") {
                let value = meta.value()?;
                let expr: Expr = value.parse()?;
                values.push(value_tokens(&expr)?);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[tracked(...)] option. Supported: behavior = \"...\", on = \"...\", field = \"...\", value = <literal>",
            ))
        })?;

        let behavior = behavior.ok_or_else(|| {
            syn::Error::new(attr.span(), "#[tracked(...)] requires behavior = \"...\"")
        })?;
        let on = on.ok_or_else(|| {
            syn::Error::new(
                attr.span(),
                "#[tracked(...)] requires on = \"create\", \"update\" or \"change\"",
            )
        })?;

        if on != TrackOn::Change && (!tracked_fields.is_empty() || !values.is_empty()) {
            return Err(syn::Error::new(
                attr.span(),
                "field and value are only allowed with on = \"change\"",
            ));
        }
        if on == TrackOn::Change && tracked_fields.is_empty() {
            return Err(syn::Error::new(
                attr.span(),
                "on = \"change\" requires field = \"...\"",
            ));
        }

        tracked.push(TrackedOptions {
            behavior,
            on,
            tracked_fields,
            values,
        });
    }

    Ok(tracked)
}

fn value_tokens(expr: &Expr) -> syn::Result<TokenStream2> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => literal_value(lit, false),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            Expr::Lit(ExprLit { lit, .. }) => literal_value(lit, true),
            other => Err(syn::Error::new(other.span(), "value must be a literal")),
        },
        Expr::Path(path) if path.path.is_ident("null") => {
            Ok(quote!(::entity_tracking::Value::Null))
        }
        other => Err(syn::Error::new(other.span(), "value must be a literal")),
    }
}

fn literal_value(lit: &Lit, negative: bool) -> syn::Result<TokenStream2> {
    match lit {
        Lit::Int(int) => {
            let parsed = int.base10_parse::<i64>()?;
            let parsed = if negative { -parsed } else { parsed };
            Ok(quote!(::entity_tracking::Value::Integer(#parsed)))
        }
        Lit::Float(float) => {
            let parsed = float.base10_parse::<f64>()?;
            let parsed = if negative { -parsed } else { parsed };
            Ok(quote!(::entity_tracking::Value::Float(#parsed)))
        }
        Lit::Str(text) if !negative => {
            let text = text.value();
            Ok(quote!(::entity_tracking::Value::Text(::std::string::String::from(#text))))
        }
        Lit::Bool(flag) if !negative => {
            let flag = flag.value;
            Ok(quote!(::entity_tracking::Value::Boolean(#flag)))
        }
        other => Err(syn::Error::new(
            other.span(),
            "value must be a string, integer, float or boolean literal",
        )),
    }
}
