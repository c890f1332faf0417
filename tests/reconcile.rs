use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_virulence::annotation::{AnnotationClient, DEFAULT_KEYWORD};
use kira_virulence::app::{EventLevel, NoopSink, ProgressEvent, ProgressSink};
use kira_virulence::domain::{GramAffinity, Organism};
use kira_virulence::error::KiraError;
use kira_virulence::reconcile::{Reconciler, fetch_automatic};
use kira_virulence::store::{FileReferenceStore, ReferenceStore};

#[derive(Default)]
struct MockAnnotation {
    bodies: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MockAnnotation {
    fn with(mut self, organism: &str, body: &str) -> Self {
        self.bodies.insert(organism.to_string(), body.to_string());
        self
    }
}

impl AnnotationClient for MockAnnotation {
    fn fetch_organism(&self, organism_id: &str, keyword: &str) -> Result<String, KiraError> {
        assert_eq!(keyword, DEFAULT_KEYWORD);
        self.calls.lock().unwrap().push(organism_id.to_string());
        self.bodies
            .get(organism_id)
            .cloned()
            .ok_or_else(|| KiraError::AnnotationStatus {
                status: 503,
                message: "unavailable".to_string(),
            })
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    fn warnings(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == EventLevel::Warning)
            .count()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn catalog() -> Vec<Organism> {
    vec![
        Organism::new("28901", GramAffinity::Neg, "Salmonella enterica"),
        Organism::new("1280", GramAffinity::Pos, "Staphylococcus aureus"),
        Organism::new("562", GramAffinity::Neg, "Escherichia coli"),
    ]
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn fetch_skips_failed_organisms_and_dedupes() {
    let client = MockAnnotation::default()
        .with("28901", "Entry\tGene Names\nP1\tinvA STM2896\nP2\tsipB\n")
        .with("562", "Entry\tGene Names\nP3\tINVA\nP4\tstx2 stxB2\n");
    let sink = RecordingSink::default();

    let set = fetch_automatic(&client, &catalog(), DEFAULT_KEYWORD, &sink);

    assert_eq!(
        *client.calls.lock().unwrap(),
        vec!["28901".to_string(), "1280".to_string(), "562".to_string()]
    );
    assert_eq!(set.skipped, vec!["1280".to_string()]);
    let genes = set.records.iter().map(|r| r.gene.as_str()).collect::<Vec<_>>();
    assert_eq!(genes, vec!["inva", "stm2896", "sipb", "stx2", "stxb2"]);
    assert!(set.records.iter().all(|r| r.weight == 3.0 && r.evidence && r.category == "unknown"));
    assert_eq!(set.records[3].gram, GramAffinity::Neg);
    assert_eq!(sink.warnings(), 1);
}

#[test]
fn unreachable_source_without_manual_yields_empty_table() {
    let temp = tempfile::tempdir().unwrap();
    let store = FileReferenceStore::new(utf8(temp.path().join("base.csv")));
    let client = MockAnnotation::default();
    let organisms = catalog();
    let sink = RecordingSink::default();

    let summary = Reconciler::new(&client, &store, &organisms, DEFAULT_KEYWORD)
        .with_manual(Some(utf8(temp.path().join("manual.csv"))))
        .run(&sink)
        .unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.manual, None);
    assert_eq!(summary.skipped_organisms.len(), 3);
    assert!(sink.warnings() >= 4);
    assert!(store.load(&NoopSink).unwrap().is_empty());
}

#[test]
fn manual_entries_override_automatic() {
    let temp = tempfile::tempdir().unwrap();
    let store = FileReferenceStore::new(utf8(temp.path().join("base.csv")));
    let manual_path = utf8(temp.path().join("manual.csv"));
    std::fs::write(
        manual_path.as_std_path(),
        "gene;categoria;gram;peso;evidencia\ninvA;invasion;neg;5;false\n",
    )
    .unwrap();
    let client = MockAnnotation::default()
        .with("28901", "Entry\tGene Names\nP1\tinvA\nP2\tsipB\n");
    let organisms = catalog();

    let summary = Reconciler::new(&client, &store, &organisms, DEFAULT_KEYWORD)
        .with_manual(Some(manual_path))
        .with_lock(store.lock_path())
        .run(&NoopSink)
        .unwrap();

    assert_eq!(summary.automatic, 2);
    assert_eq!(summary.manual, Some(1));
    assert_eq!(summary.total, 2);
    assert!(!store.lock_path().as_std_path().exists());

    let reference = store.load(&NoopSink).unwrap();
    assert_eq!(reference[0].gene, "inva");
    assert_eq!(reference[0].weight, 5.0);
    assert_eq!(reference[0].category, "invasion");
    assert!(!reference[0].evidence);
    assert_eq!(reference[1].gene, "sipb");
    assert_eq!(reference[1].weight, 3.0);
}

#[test]
fn second_writer_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let store = FileReferenceStore::new(utf8(temp.path().join("base.csv")));
    std::fs::write(store.lock_path().as_std_path(), b"").unwrap();
    let client = MockAnnotation::default();
    let organisms = catalog();

    let err = Reconciler::new(&client, &store, &organisms, DEFAULT_KEYWORD)
        .with_lock(store.lock_path())
        .run(&NoopSink)
        .unwrap_err();

    assert_matches!(err, KiraError::ReconcileInProgress(_));
    assert!(client.calls.lock().unwrap().is_empty());
    assert!(!store.exists());
}
