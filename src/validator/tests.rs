use super::*;
use crate::attributes::{Attribute, Value};
use crate::controlled_vocabulary::{accessions, ms_terms, unit_terms};
use crate::model::{Analyte, Cluster, Library, LibraryHeader, Peak, Spectrum};

fn pattern(accession: &str) -> AttributePattern {
    AttributePattern {
        accession: accession.to_string(),
        name: String::new(),
        allow_children: false,
        repeatable: false,
        value: None,
    }
}

fn rule(id: &str, path: EntityPath, attr: Vec<AttributePattern>, logic: CombinationLogic) -> Rule {
    Rule {
        id: id.to_string(),
        path,
        attr,
        combination_logic: logic,
        requirement_level: RequirementLevel::Must,
        notes: None,
    }
}

fn spectrum(key: u64, name: &str) -> Spectrum {
    let mut spectrum = Spectrum::new(key);
    spectrum.attributes.add_value(ms_terms::spectrum_name(), name);
    spectrum.attributes.add_value(ms_terms::precursor_mz(), 500.25);
    spectrum.attributes.add_value(ms_terms::charge_state(), 2i64);
    spectrum
}

fn sample_library() -> Library {
    let mut header = LibraryHeader::new();
    header.attributes.add_value(ms_terms::library_name(), "sample");
    let mut library = Library::new(header);
    library.push_spectrum(spectrum(1, "PEPTIDE/2"));
    library.push_spectrum(spectrum(2, "PEPTIDER/2"));
    library
}

fn run(rules: Vec<Rule>, library: &Library) -> Vec<ValidationRecord> {
    let ontology = InMemoryOntology::builtin().unwrap();
    Validator::new(rules, &ontology, &MzPafChecker).validate(library)
}

#[test]
fn test_or_needs_one_alternative() {
    let library = sample_library();
    let records = run(
        vec![rule(
            "has_mz",
            EntityPath::Spectrum,
            vec![pattern(accessions::SELECTED_ION_MZ), pattern(accessions::PRECURSOR_MZ)],
            CombinationLogic::Or,
        )],
        &library,
    );
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.satisfied));
    assert_eq!(records[0].entity, "/Library/Spectrum=1");
}

#[test]
fn test_and_needs_every_pattern() {
    let library = sample_library();
    let records = run(
        vec![rule(
            "has_both",
            EntityPath::Spectrum,
            vec![pattern(accessions::SELECTED_ION_MZ), pattern(accessions::PRECURSOR_MZ)],
            CombinationLogic::And,
        )],
        &library,
    );
    assert!(records.iter().all(|r| r.is_error()));
    let message = records[0].message.as_deref().unwrap();
    assert!(message.contains(accessions::SELECTED_ION_MZ), "{}", message);
}

#[test]
fn test_xor_rejects_both() {
    let library = sample_library();
    let records = run(
        vec![rule(
            "one_of",
            EntityPath::Spectrum,
            vec![pattern(accessions::CHARGE_STATE), pattern(accessions::PRECURSOR_MZ)],
            CombinationLogic::Xor,
        )],
        &library,
    );
    assert!(records.iter().all(|r| !r.satisfied));
    assert!(records[0].message.as_deref().unwrap().contains("exactly one"));
}

#[test]
fn test_duplicate_key_fails_uniqueness() {
    let mut library = sample_library();
    // bypass push_spectrum so the key collides
    let mut duplicate = spectrum(1, "DUPLICATE/3");
    duplicate.index = 2;
    library.spectra.push(duplicate);

    let rules = RuleSet::builtin("base").unwrap().rules;
    let records = run(rules, &library);
    let failures: Vec<_> = records
        .iter()
        .filter(|r| r.rule_id == "Spectrum_has_unique_key" && !r.satisfied)
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|r| r.level == RequirementLevel::Must));
    let passed = records
        .iter()
        .find(|r| r.rule_id == "Spectrum_has_unique_key" && r.satisfied)
        .unwrap();
    assert_eq!(passed.entity, "/Library/Spectrum=2");
}

#[test]
fn test_value_type_and_repeat() {
    let mut library = sample_library();
    library.spectra[0]
        .attributes
        .add_value(ms_terms::charge_state(), "two");

    let mut charge = pattern(accessions::CHARGE_STATE);
    charge.value = Some(ValueRule::ValueOfType {
        value: crate::attributes::ValueType::Integer,
    });
    let records = run(
        vec![rule("charge", EntityPath::Spectrum, vec![charge.clone()], CombinationLogic::Or)],
        &library,
    );
    assert!(records[0].message.as_deref().unwrap().contains("appears 2 times"));
    assert!(records[1].satisfied);

    charge.repeatable = true;
    let records = run(
        vec![rule("charge", EntityPath::Spectrum, vec![charge], CombinationLogic::Or)],
        &library,
    );
    assert!(records[0].message.as_deref().unwrap().contains("string value"));
}

#[test]
fn test_child_of_through_ontology() {
    let mut library = sample_library();
    library.spectra[0]
        .attributes
        .add_value(ms_terms::dissociation_method(), ms_terms::hcd());
    library.spectra[1]
        .attributes
        .add_value(ms_terms::dissociation_method(), ms_terms::consensus_spectrum());

    let mut method = pattern("MS:1000044");
    method.value = Some(ValueRule::ValueIsChildOf {
        accession: "MS:1000044".to_string(),
    });
    let records = run(
        vec![rule("method", EntityPath::Spectrum, vec![method], CombinationLogic::Or)],
        &library,
    );
    assert!(records[0].satisfied, "{:?}", records[0]);
    assert!(records[1].message.as_deref().unwrap().contains("is not a kind of"));

    // a child accession matches a parent pattern only with allow_children
    let mut hcd_library = sample_library();
    hcd_library.spectra[0]
        .attributes
        .add_value(ms_terms::hcd(), "");
    let mut parent = pattern("MS:1000044");
    let strict = run(
        vec![rule("parent", EntityPath::Spectrum, vec![parent.clone()], CombinationLogic::Or)],
        &hcd_library,
    );
    assert!(!strict[0].satisfied);
    parent.allow_children = true;
    let loose = run(
        vec![rule("parent", EntityPath::Spectrum, vec![parent], CombinationLogic::Or)],
        &hcd_library,
    );
    assert!(loose[0].satisfied);
}

#[test]
fn test_may_reported_only_when_satisfied() {
    let mut library = sample_library();
    library.spectra[0]
        .attributes
        .add_value(ms_terms::spectrum_origin_type(), ms_terms::predicted_spectrum());
    let mut origin = rule(
        "origin",
        EntityPath::Spectrum,
        vec![pattern(accessions::SPECTRUM_ORIGIN_TYPE)],
        CombinationLogic::Or,
    );
    origin.requirement_level = RequirementLevel::May;
    let records = run(vec![origin], &library);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity, "/Library/Spectrum=1");
}

#[test]
fn test_nested_entity_paths() {
    let mut library = sample_library();
    let mut analyte = Analyte::new("1");
    analyte
        .attributes
        .add_value(ms_terms::proforma_ion(), "PEPTIDE/2");
    library.spectra[1].add_analyte(analyte);
    let mut cluster = Cluster::new(7);
    cluster.members = vec![1, 2];
    library.push_cluster(cluster);

    let rules = vec![
        rule(
            "analyte",
            EntityPath::Analyte,
            vec![pattern(accessions::PROFORMA_ION)],
            CombinationLogic::Or,
        ),
        rule(
            "cluster",
            EntityPath::Cluster,
            vec![pattern(accessions::CLUSTER_KEY), pattern(accessions::CLUSTER_MEMBER_KEYS)],
            CombinationLogic::And,
        ),
    ];
    let records = run(rules, &library);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].entity, "/Library/Spectrum=2/Analyte=1");
    assert_eq!(records[1].entity, "/Library/Cluster=7");
    assert!(records.iter().all(|r| r.satisfied));
}

#[test]
fn test_object_rules() {
    let mut library = sample_library();
    library.spectra[0].peaks = vec![
        Peak::new(147.11, 100.0).with_annotation("y1/0.2ppm"),
        Peak::new(200.0, 10.0).with_annotation("3@b2"),
        Peak::new(300.0, 5.0).with_annotation("not an annotation"),
    ];
    library.spectra[0].add_analyte(Analyte::new("1"));

    let ontology = InMemoryOntology::new();
    let records = Validator::new(Vec::new(), &ontology, &MzPafChecker)
        .with_object_rules(vec![
            ObjectRule::LibraryFormatVersionFirst,
            ObjectRule::SpectrumPeakAnnotations,
        ])
        .validate(&library);
    assert_eq!(records.len(), 3);
    assert!(records[0].satisfied);
    assert_eq!(records[1].level, RequirementLevel::Should);
    let message = records[1].message.as_deref().unwrap();
    assert!(message.contains("missing analyte 3"), "{}", message);
    assert!(message.contains("peak 3"), "{}", message);
    assert!(records[2].satisfied);

    library.header.attributes.insert_front(crate::attributes::Attribute::new(
        ms_terms::library_name(),
        "first",
    ));
    let records = ObjectRule::LibraryFormatVersionFirst.evaluate(&library, &ontology, &AcceptAll);
    assert!(records[0].is_error());
}

#[test]
fn test_builtin_profiles_compose() {
    let registry = ProfileRegistry::builtin().unwrap();
    let gold = registry.compose("gold").unwrap();
    assert_eq!(gold.rule_sets, vec!["base", "peptide", "silver", "gold"]);
    assert_eq!(gold.object_rules.len(), 3);
    assert_eq!(gold.thresholds.max_should_failures, Some(0));

    let base = registry.compose("base").unwrap();
    assert_eq!(base.thresholds.max_should_failures, None);
    assert!(base.rules.iter().any(|r| r.id == "Spectrum_has_unique_key"));
}

#[test]
fn test_duplicate_rule_id_is_composition_error() {
    let mut registry = ProfileRegistry::builtin().unwrap();
    let mut copy = RuleSet::builtin("base").unwrap();
    copy.name = "base_copy".to_string();
    registry.add_rule_set(copy);
    registry
        .add_profiles_toml(
            r#"
[profiles.twice]
extends = "base"
rule_sets = ["base", "base_copy"]
"#,
        )
        .unwrap();

    match registry.compose("twice") {
        Err(ValidationError::DuplicateRuleId { id, rule_set }) => {
            assert_eq!(id, "Library_has_format_version");
            assert_eq!(rule_set, "base_copy");
        }
        other => panic!("expected duplicate rule id, got {:?}", other.map(|p| p.name)),
    }
}

#[test]
fn test_profile_errors() {
    let mut registry = ProfileRegistry::builtin().unwrap();
    assert!(matches!(
        registry.compose("platinum"),
        Err(ValidationError::UnknownProfile(_))
    ));
    registry
        .add_profiles_toml(
            r#"
[profiles.missing]
rule_sets = ["nope"]

[profiles.a]
extends = "b"

[profiles.b]
extends = "a"
"#,
        )
        .unwrap();
    assert!(matches!(
        registry.compose("missing"),
        Err(ValidationError::UnknownRuleSet(name)) if name == "nope"
    ));
    assert!(matches!(
        registry.compose("a"),
        Err(ValidationError::CyclicProfile(_))
    ));
    assert!(matches!(
        ProfileRegistry::from_toml("[profiles"),
        Err(ValidationError::Profile(_))
    ));
    assert!(matches!(RuleSet::from_json("[]"), Err(ValidationError::RuleSet(_))));
}

#[test]
fn test_verdict_and_report() {
    let mut library = sample_library();
    library.spectra[1].attributes.remove_all(accessions::PRECURSOR_MZ);

    let registry = ProfileRegistry::builtin().unwrap();
    let profile = registry.compose("base").unwrap();
    let ontology = InMemoryOntology::builtin().unwrap();
    let records = profile.validator(&ontology, &MzPafChecker).validate(&library);

    let verdict = profile.thresholds.verdict(&records);
    assert!(!verdict.passed);
    assert_eq!(verdict.must_failures, 1);

    let lenient = ProfileThresholds {
        max_must_failures: 1,
        max_should_failures: None,
    };
    assert!(lenient.verdict(&records).passed);

    let report = ValidationReport::from_records("sample.mzlib.txt", &records).with_verdict(verdict);
    let text = report.to_string();
    assert!(text.starts_with("mzSpecLib Validation Report"));
    assert!(text.contains("[✗] Spectrum_has_precursor_mz at /Library/Spectrum=2"));
    assert!(text.contains("[✓] Library_has_format_version (1 entity)"));
    assert!(text.contains(&format!(
        "Summary: {} passed, {} warnings, 1 failed",
        report.success_count(),
        report.warning_count()
    )));
    let should_failures = report.verdict.as_ref().map(|v| v.should_failures).unwrap();
    assert!(text.contains(&format!(
        "Profile: 1 MUST and {} SHOULD failures",
        should_failures
    )));
    assert!(text.trim_end().ends_with("Validation FAILED"));
}

#[test]
fn test_grouped_occurrences_are_not_repeats() {
    let precursor_rule = || {
        RuleSet::builtin("base")
            .unwrap()
            .rules
            .into_iter()
            .filter(|r| r.id == "Spectrum_has_precursor_mz")
            .collect::<Vec<_>>()
    };

    let mut library = sample_library();
    for spectrum in &mut library.spectra {
        spectrum.attributes.remove_all(accessions::PRECURSOR_MZ);
    }
    let chimeric = &mut library.spectra[0].attributes;
    chimeric.add_group([Attribute::new(ms_terms::precursor_mz(), 100.5)]);
    chimeric.add_group([Attribute::new(ms_terms::precursor_mz(), 200.5)]);
    let repeated = &mut library.spectra[1].attributes;
    repeated.add_value(ms_terms::precursor_mz(), 100.5);
    repeated.add_value(ms_terms::precursor_mz(), 200.5);

    let records = run(precursor_rule(), &library);
    assert_eq!(records.len(), 2);
    assert!(records[0].satisfied, "{:?}", records[0].message);
    assert!(!records[1].satisfied);
    assert!(records[1]
        .message
        .as_deref()
        .unwrap()
        .contains("appears 2 times"));
}

#[test]
fn test_attribute_value_types_and_units() {
    let mut library = sample_library();
    library.spectra[0]
        .attributes
        .add_with_unit(ms_terms::retention_time(), 12.5, unit_terms::minute());
    library.spectra[1]
        .attributes
        .add_value(ms_terms::charge_state(), "two");
    library.spectra[1].attributes.add_with_unit(
        ms_terms::collision_energy(),
        30.0,
        unit_terms::second(),
    );
    let mut analyte = Analyte::new("1");
    analyte.attributes.add_value(
        ms_terms::charge_state(),
        Value::List(vec![Value::Int(2), Value::Float(2.5)]),
    );
    library.spectra[1].add_analyte(analyte);

    let ontology = InMemoryOntology::builtin().unwrap();
    let records = ObjectRule::AttributeValues.evaluate(&library, &ontology, &AcceptAll);
    let failures: Vec<&ValidationRecord> = records.iter().filter(|r| !r.satisfied).collect();
    assert_eq!(failures.len(), 2, "{:?}", failures);

    assert_eq!(failures[0].entity, "/Library/Spectrum=2");
    assert_eq!(failures[0].path, EntityPath::Spectrum);
    assert_eq!(failures[0].level, RequirementLevel::Should);
    let message = failures[0].message.as_deref().unwrap();
    assert!(message.contains("MS:1000041|charge state has string value two"), "{}", message);
    assert!(message.contains("MS:1000045|collision energy has unit UO:0000010|second"), "{}", message);

    assert_eq!(failures[1].entity, "/Library/Spectrum=2/Analyte=1");
    assert!(failures[1].message.as_deref().unwrap().contains("float value 2.5"));

    assert!(records
        .iter()
        .any(|r| r.entity == "/Library/Spectrum=1" && r.satisfied));
}
