//! Prometheus collector
//!
//! `ScriptCollector` runs every configured script on each collect and turns
//! the observations into gauge families. Observations are built per scrape,
//! the way const metrics are, so series disappear as soon as a script stops
//! reporting them.

use ahash::AHashSet;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::observability::{spans, CollectingSink, MetricObservation};
use crate::script::emitter::{
    FILENAME_LABEL, KEY_LABEL, SCRIPT_RESULT, SCRIPT_VALUES, SCRIPT_VALUES_AS_STRING, VALUE_LABEL,
};
use crate::script::{run_script, Classifier, Script};
use crate::store::ScriptExecutor;

struct FamilySpec {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
}

const FAMILIES: [FamilySpec; 3] = [
    FamilySpec {
        name: SCRIPT_VALUES,
        help: "Values returned by the collect script",
        labels: &[KEY_LABEL, FILENAME_LABEL],
    },
    FamilySpec {
        name: SCRIPT_VALUES_AS_STRING,
        help: "String values returned by the collect script",
        labels: &[KEY_LABEL, FILENAME_LABEL, VALUE_LABEL],
    },
    FamilySpec {
        name: SCRIPT_RESULT,
        help: "Result of the collect script evaluation",
        labels: &[FILENAME_LABEL],
    },
];

/// `<namespace>_<name>`, or `name` alone for an empty namespace.
pub fn full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

fn help_for(name: &str) -> &str {
    FAMILIES
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.help)
        .unwrap_or(name)
}

/// Runs scripts on every collect and exposes the results as gauges.
pub struct ScriptCollector<E: ScriptExecutor> {
    executor: E,
    scripts: Vec<Script>,
    classifier: Classifier,
    namespace: String,
    descs: Vec<Desc>,
}

impl<E: ScriptExecutor> ScriptCollector<E> {
    /// Fails if `namespace` does not form valid metric names.
    pub fn new(
        executor: E,
        scripts: Vec<Script>,
        classifier: Classifier,
        namespace: &str,
    ) -> prometheus::Result<Self> {
        let descs = FAMILIES
            .iter()
            .map(|family| {
                Desc::new(
                    full_name(namespace, family.name),
                    family.help.to_string(),
                    family.labels.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(ScriptCollector {
            executor,
            scripts,
            classifier,
            namespace: namespace.to_string(),
            descs,
        })
    }

    /// Run every script once and return all observations.
    ///
    /// A failing script contributes its `Failure` status; the others are
    /// unaffected.
    pub fn scrape(&self) -> Vec<MetricObservation> {
        let span = spans::scrape_span(self.scripts.len());
        let _guard = span.enter();

        let mut observations = Vec::new();
        for script in &self.scripts {
            let sink = CollectingSink::new();
            if let Err(e) = run_script(&self.executor, script, &self.classifier, &sink) {
                warn!(filename = %script.filename(), "Script run failed: {}", e);
            }
            observations.extend(sink.take());
        }
        debug!(observations = observations.len(), "Scrape complete");
        observations
    }
}

impl<E: ScriptExecutor> Collector for ScriptCollector<E> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        to_families(&self.namespace, &self.scrape())
    }
}

/// Group observations into gauge families, in order of first appearance.
///
/// A series (family plus label set) is exported once. Later observations of
/// the same series are dropped with a warning.
pub fn to_families(namespace: &str, observations: &[MetricObservation]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut seen: AHashSet<(&str, &[(String, String)])> = AHashSet::new();

    for observation in observations {
        if !seen.insert((observation.name.as_str(), observation.labels.as_slice())) {
            warn!(
                name = %observation.name,
                labels = ?observation.labels,
                value = observation.value,
                "Dropping duplicate series"
            );
            continue;
        }
        let name = full_name(namespace, &observation.name);
        let index = match families.iter().position(|f| f.get_name() == name) {
            Some(index) => index,
            None => {
                let mut family = MetricFamily::default();
                family.set_name(name);
                family.set_help(help_for(&observation.name).to_string());
                family.set_field_type(MetricType::GAUGE);
                families.push(family);
                families.len() - 1
            }
        };
        families[index].mut_metric().push(gauge_metric(observation));
    }

    families
}

fn gauge_metric(observation: &MetricObservation) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in &observation.labels {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }
    let mut gauge = Gauge::default();
    gauge.set_value(observation.value);
    metric.set_gauge(gauge);
    metric
}

/// Gather `registry` and encode it in the text exposition format.
pub fn encode_text(registry: &Registry) -> prometheus::Result<String> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("exposition is not valid UTF-8: {}", e))
    })
}
