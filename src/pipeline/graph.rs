//! Registration, validation and evaluation of value pipelines.
//!
//! Components register producers and modifiers on a [`PipelineGraphBuilder`]
//! during setup. [`PipelineGraphBuilder::build`] resolves every referenced
//! name and rejects dependency cycles, so a wiring mistake aborts the run
//! before the first time step. The resulting [`ValuePipelineGraph`] is
//! immutable and evaluates pipelines on demand.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::lookup::LookupTable;
use crate::pipeline::combiner::{Combiner, union_post_processor};
use crate::pipeline::value::PipelineValue;
use crate::population::{PopulationTable, RandomnessManager, SimulationClock};

/// Computes a pipeline's base value
pub type SourceFn =
    Arc<dyn Fn(&EvalContext<'_>, &[usize]) -> Result<PipelineValue> + Send + Sync>;

/// Transforms (replace) or contributes to (list-union) a pipeline's value
pub type ModifierFn = Arc<
    dyn Fn(&EvalContext<'_>, &[usize], &PipelineValue) -> Result<PipelineValue> + Send + Sync,
>;

/// Read-only state available while evaluating pipelines
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub population: &'a PopulationTable,
    pub values: &'a ValuePipelineGraph,
    pub clock: &'a SimulationClock,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub const fn new(
        population: &'a PopulationTable,
        values: &'a ValuePipelineGraph,
        clock: &'a SimulationClock,
    ) -> Self {
        Self {
            population,
            values,
            clock,
        }
    }

    /// Evaluate the pipeline `name` for `index`
    pub fn value(&self, name: &str, index: &[usize]) -> Result<PipelineValue> {
        self.values.get_value(name, self, index)
    }

    /// Resolve lookup rows for `index`
    pub fn lookup(&self, table: &LookupTable, index: &[usize]) -> Result<arrow::record_batch::RecordBatch> {
        table.lookup(self.population, self.clock, index)
    }
}

/// Declared inputs of a producer or modifier
///
/// Used to validate wiring at setup time; evaluation does not enforce them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub columns: Vec<String>,
    pub values: Vec<String>,
    pub streams: Vec<String>,
}

impl Requirements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns.extend(columns.iter().map(|c| c.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn values<S: AsRef<str>>(mut self, values: &[S]) -> Self {
        self.values.extend(values.iter().map(|v| v.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn streams<S: AsRef<str>>(mut self, streams: &[S]) -> Self {
        self.streams.extend(streams.iter().map(|s| s.as_ref().to_string()));
        self
    }

    fn extend(&mut self, other: &Self) {
        self.columns.extend(other.columns.iter().cloned());
        self.values.extend(other.values.iter().cloned());
        self.streams.extend(other.streams.iter().cloned());
    }
}

/// Cheap named reference to a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    name: String,
}

impl PipelineHandle {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the referenced pipeline
    pub fn get(&self, ctx: &EvalContext<'_>, index: &[usize]) -> Result<PipelineValue> {
        ctx.value(&self.name, index)
    }
}

struct Producer {
    source: SourceFn,
    combiner: Combiner,
    requires: Requirements,
}

struct Modifier {
    modify: ModifierFn,
    combiner: Combiner,
    requires: Requirements,
}

/// Collects pipeline registrations during setup
#[derive(Default)]
pub struct PipelineGraphBuilder {
    producers: FxHashMap<String, Producer>,
    registration_order: Vec<String>,
    modifiers: FxHashMap<String, Vec<Modifier>>,
    consumers: Vec<(String, String)>,
}

impl fmt::Debug for PipelineGraphBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineGraphBuilder")
            .field("producers", &self.registration_order)
            .field("modified", &self.modifiers.keys().sorted().collect_vec())
            .finish()
    }
}

impl PipelineGraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the source computation of pipeline `name`
    ///
    /// # Errors
    /// Returns `Error::DuplicateRegistration` if `name` already has a producer
    pub fn register_producer<F>(
        &mut self,
        name: &str,
        source: F,
        combiner: Combiner,
        requires: Requirements,
    ) -> Result<PipelineHandle>
    where
        F: Fn(&EvalContext<'_>, &[usize]) -> Result<PipelineValue> + Send + Sync + 'static,
    {
        if self.producers.contains_key(name) {
            return Err(Error::DuplicateRegistration {
                name: name.to_string(),
            });
        }
        log::debug!("Registering producer for pipeline '{name}'");
        self.producers.insert(
            name.to_string(),
            Producer {
                source: Arc::new(source),
                combiner,
                requires,
            },
        );
        self.registration_order.push(name.to_string());
        Ok(PipelineHandle::new(name))
    }

    /// Attach a modifier to pipeline `name`
    ///
    /// Modifiers may be registered before the producer; the pairing is checked
    /// when the graph is built. `combiner` must agree with the producer's.
    pub fn register_modifier<F>(
        &mut self,
        name: &str,
        modifier: F,
        combiner: Combiner,
        requires: Requirements,
    ) where
        F: Fn(&EvalContext<'_>, &[usize], &PipelineValue) -> Result<PipelineValue>
            + Send
            + Sync
            + 'static,
    {
        log::debug!("Registering {combiner:?} modifier for pipeline '{name}'");
        self.modifiers.entry(name.to_string()).or_default().push(Modifier {
            modify: Arc::new(modifier),
            combiner,
            requires,
        });
    }

    /// Declare that `consumer` reads pipeline `name` without modifying it
    pub fn require_value(&mut self, consumer: &str, name: &str) -> PipelineHandle {
        self.consumers.push((consumer.to_string(), name.to_string()));
        PipelineHandle::new(name)
    }

    /// Resolve names, check combiners and reject cycles
    pub fn build(self) -> Result<ValuePipelineGraph> {
        let Self {
            mut producers,
            registration_order,
            mut modifiers,
            consumers,
        } = self;

        if let Some(orphan) = modifiers.keys().filter(|n| !producers.contains_key(*n)).min() {
            return Err(Error::UnknownPipeline {
                name: orphan.clone(),
            });
        }
        if let Some((consumer, name)) = consumers.iter().find(|(_, n)| !producers.contains_key(n)) {
            log::error!("'{consumer}' reads unregistered pipeline '{name}'");
            return Err(Error::UnknownPipeline { name: name.clone() });
        }

        let mut pipelines = FxHashMap::default();
        for name in &registration_order {
            let Some(producer) = producers.remove(name) else {
                continue;
            };
            let attached = modifiers.remove(name).unwrap_or_default();
            let mut requires = producer.requires.clone();
            for modifier in &attached {
                if modifier.combiner != producer.combiner {
                    return Err(Error::configuration(format!(
                        "Modifier of '{name}' uses {:?} but the pipeline combines with {:?}",
                        modifier.combiner, producer.combiner
                    )));
                }
                requires.extend(&modifier.requires);
            }
            if let Some(missing) = requires.values.iter().find(|v| {
                !registration_order.contains(*v)
            }) {
                return Err(Error::UnknownPipeline {
                    name: missing.clone(),
                });
            }
            pipelines.insert(
                name.clone(),
                Pipeline {
                    source: producer.source,
                    combiner: producer.combiner,
                    modifiers: attached,
                    requires,
                },
            );
        }

        let evaluation_order = topological_order(&registration_order, &pipelines)?;
        log::info!("Built value graph with {} pipelines", pipelines.len());
        Ok(ValuePipelineGraph {
            pipelines,
            evaluation_order,
        })
    }
}

struct Pipeline {
    source: SourceFn,
    combiner: Combiner,
    modifiers: Vec<Modifier>,
    requires: Requirements,
}

/// Kahn's algorithm over pipeline -> required pipeline edges.
///
/// Returns dependencies before dependents.
fn topological_order(
    names: &[String],
    pipelines: &FxHashMap<String, Pipeline>,
) -> Result<Vec<String>> {
    let mut pending: FxHashMap<&str, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for name in names {
        let requires: FxHashSet<&str> = pipelines[name]
            .requires
            .values
            .iter()
            .map(String::as_str)
            .collect();
        pending.insert(name.as_str(), requires.len());
        for dependency in requires {
            dependents.entry(dependency).or_default().push(name.as_str());
        }
    }

    let mut ready: VecDeque<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| pending[n] == 0)
        .collect();
    let mut order = Vec::with_capacity(names.len());
    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() != names.len() {
        let stuck: Vec<String> = names
            .iter()
            .filter(|n| pending[n.as_str()] > 0)
            .cloned()
            .collect();
        return Err(Error::DependencyCycle { pipelines: stuck });
    }
    Ok(order)
}

/// The validated, immutable pipeline graph
#[derive(Default)]
pub struct ValuePipelineGraph {
    pipelines: FxHashMap<String, Pipeline>,
    evaluation_order: Vec<String>,
}

impl fmt::Debug for ValuePipelineGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuePipelineGraph")
            .field("pipelines", &self.evaluation_order)
            .finish()
    }
}

impl ValuePipelineGraph {
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Pipeline names with every dependency listed before its dependents
    #[must_use]
    pub fn evaluation_order(&self) -> &[String] {
        &self.evaluation_order
    }

    /// Combined requirements of a pipeline's producer and modifiers
    #[must_use]
    pub fn requirements(&self, name: &str) -> Option<&Requirements> {
        self.pipelines.get(name).map(|p| &p.requires)
    }

    /// Check that every declared column and stream exists
    pub fn validate_requirements(
        &self,
        columns: &FxHashSet<String>,
        streams: &RandomnessManager,
    ) -> Result<()> {
        for name in &self.evaluation_order {
            let requires = &self.pipelines[name].requires;
            if let Some(column) = requires.columns.iter().find(|c| !columns.contains(*c)) {
                return Err(Error::configuration(format!(
                    "Pipeline '{name}' requires column '{column}' which no component creates"
                )));
            }
            if let Some(stream) = requires.streams.iter().find(|s| !streams.has_stream(s)) {
                return Err(Error::configuration(format!(
                    "Pipeline '{name}' requires unregistered randomness stream '{stream}'"
                )));
            }
        }
        Ok(())
    }

    /// Evaluate pipeline `name` for `index`
    ///
    /// Walks the source and modifier chain every time it is called; the
    /// result depends only on the current table, clock and registered
    /// pipelines, so repeated calls within a step agree.
    pub fn get_value(
        &self,
        name: &str,
        ctx: &EvalContext<'_>,
        index: &[usize],
    ) -> Result<PipelineValue> {
        let pipeline = self.pipelines.get(name).ok_or_else(|| Error::UnknownPipeline {
            name: name.to_string(),
        })?;
        let value = (pipeline.source)(ctx, index)?;

        match pipeline.combiner {
            Combiner::Replace => pipeline
                .modifiers
                .iter()
                .try_fold(value, |current, m| (m.modify)(ctx, index, &current)),
            Combiner::ListUnion => {
                let mut current = PipelineValue::List(value.into_list()?);
                for modifier in &pipeline.modifiers {
                    let contribution = (modifier.modify)(ctx, index, &current)?.into_float()?;
                    if let PipelineValue::List(list) = &mut current {
                        list.push(contribution);
                    }
                }
                let contributions = current.into_list()?;
                Ok(PipelineValue::Float(union_post_processor(
                    &contributions,
                    index.len(),
                )?))
            }
        }
    }
}
