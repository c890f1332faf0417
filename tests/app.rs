use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_virulence::annotation::AnnotationClient;
use kira_virulence::app::{App, NoopSink, TEMPLATE_CSV, write_template};
use kira_virulence::config::{Config, ConfigLoader, OrganismEntry, ResolvedConfig};
use kira_virulence::domain::{GramAffinity, GramStain, RiskLabel};
use kira_virulence::error::KiraError;
use kira_virulence::output::JsonOutput;

#[derive(Default)]
struct MockAnnotation;

impl AnnotationClient for MockAnnotation {
    fn fetch_organism(&self, organism_id: &str, _keyword: &str) -> Result<String, KiraError> {
        match organism_id {
            "28901" => Ok("Entry\tGene Names\nP1\tinvA sipB\n".to_string()),
            _ => Err(KiraError::AnnotationHttp("connection refused".to_string())),
        }
    }
}

fn config_in(dir: &tempfile::TempDir) -> ResolvedConfig {
    let config = Config {
        schema_version: Some(1),
        reference_path: Some(dir.path().join("base.csv").display().to_string()),
        manual_path: Some(dir.path().join("manual.csv").display().to_string()),
        keyword: None,
        base_url: None,
        organisms: Some(vec![
            OrganismEntry::Shorthand("28901:neg".to_string()),
            OrganismEntry::Shorthand("1280:pos".to_string()),
        ]),
    };
    ConfigLoader::resolve_config(config).unwrap()
}

#[test]
fn reconcile_then_classify() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("manual.csv"),
        "gene,categoria,gram,peso,evidencia\nstx2,toxin,both,8,true\ninvA,invasion,neg,4,true\n",
    )
    .unwrap();
    let input = temp.path().join("hits.csv");
    std::fs::write(
        &input,
        "Gene,Identity (%),Coverage (%)\nInvA,98,100\nsipB,99,99\nstx2,99,100\nspvC,70,100\nabc,99,99\n",
    )
    .unwrap();

    let app = App::new(config_in(&temp), MockAnnotation::default());
    let summary = app.reconcile(&JsonOutput).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.skipped_organisms, vec!["1280".to_string()]);

    let report = app.classify(&input, GramStain::Neg, &JsonOutput).unwrap();
    let scores = report
        .result
        .details
        .iter()
        .map(|d| (d.gene.as_str(), d.category.as_str(), d.score))
        .collect::<Vec<_>>();
    assert_eq!(
        scores,
        vec![
            ("InvA", "invasion", 6.0),
            ("sipB", "unknown", 4.5),
            ("stx2", "toxin", 12.0),
            ("spvC", "not classified", 0.0),
            ("abc", "not classified", 0.0),
        ]
    );
    assert_eq!(report.result.total_score, 22.5);
    assert_eq!(report.result.risk, RiskLabel::High);
    assert_eq!(report.categories["not classified"].count, 2);
    assert_eq!(report.categories["invasion"].score_sum, 6.0);
    assert_eq!(report.reference_records, 3);
}

#[test]
fn classify_gram_positive_ignores_neg_records() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("base.csv"),
        "gene,categoria,gram,peso,evidencia\ninva,invasion,neg,4,true\nica,biofilm,pos,7,false\n",
    )
    .unwrap();
    let input = temp.path().join("hits.csv");
    std::fs::write(&input, "gene;identidade;cobertura\ninvA;99;100\nicaA;99;100\nica;90;96\n").unwrap();

    let app = App::new(config_in(&temp), MockAnnotation::default());
    let report = app.classify(&input, GramStain::Pos, &NoopSink).unwrap();

    assert_eq!(report.result.details[0].category, "not classified");
    assert_eq!(report.result.details[2].score, 7.0);
    assert_eq!(report.result.total_score, 7.0);
    assert_eq!(report.result.label, "Low probability of being pathogenic");
}

#[test]
fn classify_skips_records_with_unrecognized_gram() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("base.csv"),
        "gene,categoria,gram,peso,evidencia\nhlya,toxin,gram-variable,10,true\nspa,adhesion,,10,true\n",
    )
    .unwrap();
    let input = temp.path().join("hits.csv");
    std::fs::write(&input, "gene,identity,coverage\nhlyA,99,99\nspa,99,99\n").unwrap();

    let app = App::new(config_in(&temp), MockAnnotation::default());
    let report = app.classify(&input, GramStain::Neg, &NoopSink).unwrap();

    assert!(report.result.details.iter().all(|d| d.category == "not classified"));
    assert_eq!(report.result.total_score, 0.0);
    assert_eq!(report.result.risk, RiskLabel::Low);
}

#[test]
fn organism_with_misspelled_gram_is_rejected() {
    let config = Config {
        organisms: Some(vec![OrganismEntry::Shorthand("562:ng".to_string())]),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, KiraError::InvalidOrganism(entry) if entry == "562:ng");
}

#[test]
fn classify_rejects_ambiguous_input() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("base.csv"), "gene\ninva\n").unwrap();
    let input = temp.path().join("hits.csv");
    std::fs::write(&input, "gene,coverage,query_coverage,identity\ninvA,100,100,99\n").unwrap();

    let app = App::new(config_in(&temp), MockAnnotation::default());
    let err = app.classify(&input, GramStain::Neg, &NoopSink).unwrap_err();
    assert_matches!(err, KiraError::AmbiguousColumn { column, .. } if column == "coverage");
}

#[test]
fn classify_missing_input_file() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(config_in(&temp), MockAnnotation::default());
    let err = app
        .classify(&temp.path().join("nope.csv"), GramStain::Neg, &NoopSink)
        .unwrap_err();
    assert_matches!(err, KiraError::InputMissing(_));
}

#[test]
fn organisms_from_detailed_entries() {
    let raw = r#"{
        "reference_path": "data/base.csv",
        "organisms": ["562:neg", { "id": "1280", "gram": "pos", "name": "Staphylococcus aureus" }]
    }"#;
    let config: Config = serde_json::from_str(raw).unwrap();
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.reference_path, Utf8PathBuf::from("data/base.csv"));
    assert_eq!(resolved.organisms.len(), 2);
    assert_eq!(resolved.organisms[0].gram, GramAffinity::Neg);
    assert_eq!(resolved.organisms[1].name.as_deref(), Some("Staphylococcus aureus"));
}

#[test]
fn template_is_a_valid_input() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("modelo.csv")).unwrap();
    let result = write_template(Some(&path)).unwrap();
    assert_eq!(result.path, path.to_string());
    assert_eq!(std::fs::read_to_string(path.as_std_path()).unwrap(), TEMPLATE_CSV);

    let hits = kira_virulence::classify::read_hits(path.as_std_path()).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[1].identity, 87.3);
}
