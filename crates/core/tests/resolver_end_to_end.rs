use metaplate_core::{DimensionBindings, MetadataDocument, Resolver, ResolverOptions, resolve};
use serde_yaml::Value;

fn document(yaml: &str) -> MetadataDocument {
    MetadataDocument::from_yaml_str(yaml).expect("valid document")
}

fn bindings(pairs: &[(&str, &str)]) -> DimensionBindings {
    DimensionBindings::from_pairs(pairs.iter().copied())
}

const CAUSES_OF_DEATH: &str = r#"
definitions:
  common:
    unit: deaths
    presentation:
      topic_tags:
        - Causes of Death
  entity: individuals aged <<age>>
  helpers: "<% macro format_sex(s) %><% if s == 'Male' %>males<% elif s == 'Female' %>females<% else %>people<% endif %><% endmacro %>"
dataset:
  title: Causes of death - <<cause>>
  update_period_days: 365
tables:
  causes:
    variables:
      deaths:
        title: Deaths from <<cause.lower()>>, among <<format_sex(sex)>> aged <<age>>
        description_short: Among {definitions.entity}.
        display:
          name: <<cause>>
"#;

#[test]
fn resolves_titles_with_methods_and_dimensions() {
    let doc = document(CAUSES_OF_DEATH);
    let b = bindings(&[("cause", "Malaria"), ("age", "15-19"), ("sex", "Male")]);

    let resolved = resolve(&doc, &b).expect("resolve ok");
    assert_eq!(
        resolved.get("tables.causes.variables.deaths.title").unwrap().as_str(),
        Some("Deaths from malaria, among males aged 15-19")
    );
    assert_eq!(
        resolved.get("dataset.title").unwrap().as_str(),
        Some("Causes of death - Malaria")
    );
}

#[test]
fn resolved_document_snapshot() {
    let doc = document(CAUSES_OF_DEATH);
    let b = bindings(&[("cause", "Malaria"), ("age", "15-19"), ("sex", "Male")]);

    let yaml = resolve(&doc, &b).expect("resolve ok").to_yaml().expect("serialize");
    insta::assert_snapshot!(yaml.trim_end(), @r"
    dataset:
      title: Causes of death - Malaria
      update_period_days: 365
    tables:
      causes:
        variables:
          deaths:
            unit: deaths
            presentation:
              topic_tags:
              - Causes of Death
            title: Deaths from malaria, among males aged 15-19
            description_short: Among individuals aged 15-19.
            display:
              name: Malaria
    ");
}

#[test]
fn resolution_is_deterministic() {
    let doc = document(CAUSES_OF_DEATH);
    let b = bindings(&[("cause", "Malaria"), ("age", "15-19"), ("sex", "Female")]);

    let first = resolve(&doc, &b).expect("resolve ok").to_yaml().expect("serialize");
    let second = resolve(&doc, &b).expect("resolve ok").to_yaml().expect("serialize");
    assert_eq!(first, second);
}

#[test]
fn resolution_is_idempotent() {
    let doc = document(CAUSES_OF_DEATH);
    let b = bindings(&[("cause", "Malaria"), ("age", "15-19"), ("sex", "Male")]);

    let once = resolve(&doc, &b).expect("resolve ok");
    let again = resolve(&MetadataDocument::new(once.root().clone()), &b)
        .expect("resolve resolved ok");
    assert_eq!(once, again);
}

#[test]
fn plain_document_passes_through_unchanged() {
    let doc = document(
        "dataset:\n  title: No templates here\ntables:\n  t:\n    variables:\n      v:\n        title: Plain title\n        description_short: \"Keeps {braces} and   spacing\"\n",
    );
    let resolved = resolve(&doc, &bindings(&[])).expect("resolve ok");
    assert_eq!(&Value::Mapping(resolved.root().clone()), &Value::Mapping(doc.root().clone()));
}

#[test]
fn conditional_blocks_select_per_binding() {
    let doc = document(
        "tables:\n  t:\n    variables:\n      v:\n        title: \"Deaths<% if sex != 'Total' %> among <<sex.lower()>>s<% endif %>\"\n",
    );

    let with_sex = resolve(&doc, &bindings(&[("sex", "Male")])).expect("resolve ok");
    assert_eq!(
        with_sex.get("tables.t.variables.v.title").unwrap().as_str(),
        Some("Deaths among males")
    );

    let total = resolve(&doc, &bindings(&[("sex", "Total")])).expect("resolve ok");
    assert_eq!(
        total.get("tables.t.variables.v.title").unwrap().as_str(),
        Some("Deaths")
    );
}

#[test]
fn custom_recursion_limit_is_honoured() {
    let doc = document(
        "definitions:\n  helpers: \"<% macro nest(x) %><<nest(x)>><% endmacro %>\"\ntables:\n  t:\n    variables:\n      v:\n        title: <<nest('a')>>\n",
    );
    let resolver =
        Resolver::with_options(ResolverOptions { macro_recursion_limit: 3 });
    let err = resolver.resolve(&doc, &bindings(&[])).unwrap_err();
    assert!(matches!(
        err,
        metaplate_core::ResolveError::RecursionLimitExceeded { limit: 3, .. }
    ));
}
