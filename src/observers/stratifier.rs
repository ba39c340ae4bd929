//! Partitioning of simulants into output strata.
//!
//! Every stratum in the cross product of the configured axes is produced,
//! including empty ones, so an observer always emits the full keyspace.

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use smallvec::SmallVec;

use crate::config::{MetricsConfig, StratificationConfig};
use crate::error::{Error, Result};
use crate::pipeline::EvalContext;
use crate::population::{DAYS_PER_YEAR, columns};
use crate::results::naming::ObservationKey;
use crate::simulation::SimulationBuilder;
use crate::utils::arrow::{float_values, string_values};

/// Age groups of the under-five population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeGroup {
    EarlyNeonatal,
    LateNeonatal,
    PostNeonatal,
    OneToFour,
}

impl AgeGroup {
    pub const ALL: [Self; 4] = [
        Self::EarlyNeonatal,
        Self::LateNeonatal,
        Self::PostNeonatal,
        Self::OneToFour,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EarlyNeonatal => "early_neonatal",
            Self::LateNeonatal => "late_neonatal",
            Self::PostNeonatal => "post_neonatal",
            Self::OneToFour => "1_to_4",
        }
    }

    /// Half-open `[start, end)` bounds in years
    #[must_use]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::EarlyNeonatal => (0.0, 7.0 / DAYS_PER_YEAR),
            Self::LateNeonatal => (7.0 / DAYS_PER_YEAR, 28.0 / DAYS_PER_YEAR),
            Self::PostNeonatal => (28.0 / DAYS_PER_YEAR, 1.0),
            Self::OneToFour => (1.0, 5.0),
        }
    }

    /// The group containing `age`, if any
    #[must_use]
    pub fn of(age: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|group| {
            let (start, end) = group.bounds();
            start <= age && age < end
        })
    }
}

/// Sex labels as they appear in the population table and in output keys
pub const SEXES: [(&str, &str); 2] = [("Male", "male"), ("Female", "female")];

/// Exposure categories of the extra stratification axes
pub const EXPOSURE_CATEGORIES: [&str; 2] = ["cat1", "cat2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Sex,
    AgeGroup,
    VitaminA,
    Zinc,
}

#[derive(Debug, Clone)]
struct Axis {
    slot: Slot,
    /// Label used in output keys, by position
    labels: Vec<&'static str>,
    /// Pipeline or column carrying the raw value, for the extra axes
    source: Option<String>,
}

/// One combination of axis labels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stratum {
    pub sex: Option<&'static str>,
    pub age_group: Option<&'static str>,
    pub vitamin_a: Option<&'static str>,
    pub zinc: Option<&'static str>,
}

impl Stratum {
    /// Key of `measure` observed in this stratum
    pub fn key(&self, measure: &str, year: Option<i32>) -> ObservationKey {
        ObservationKey {
            measure: measure.to_string(),
            year,
            sex: self.sex.map(str::to_string),
            age_group: self.age_group.map(str::to_string),
            vitamin_a: self.vitamin_a.map(str::to_string),
            zinc: self.zinc.map(str::to_string),
        }
    }
}

/// Simulants grouped by stratum
#[derive(Debug, Clone)]
pub struct Partition {
    strata: Vec<Stratum>,
    members: Vec<Vec<usize>>,
}

impl Partition {
    /// Each stratum with the positions (into the observed index) of its members
    pub fn iter(&self) -> impl Iterator<Item = (&Stratum, &[usize])> {
        self.strata
            .iter()
            .zip(&self.members)
            .map(|(stratum, members)| (stratum, members.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strata.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }
}

/// Assigns simulants to strata along the configured axes
#[derive(Debug, Clone)]
pub struct Stratifier {
    by_year: bool,
    axes: SmallVec<[Axis; 4]>,
}

impl Stratifier {
    /// Demographic axes only
    #[must_use]
    pub fn new(metrics: MetricsConfig) -> Self {
        let mut axes = SmallVec::new();
        if metrics.by_sex {
            axes.push(Axis {
                slot: Slot::Sex,
                labels: SEXES.iter().map(|(_, label)| *label).collect(),
                source: None,
            });
        }
        if metrics.by_age {
            axes.push(Axis {
                slot: Slot::AgeGroup,
                labels: AgeGroup::ALL.iter().map(|g| g.as_str()).collect(),
                source: None,
            });
        }
        Self {
            by_year: metrics.by_year,
            axes,
        }
    }

    /// Demographic axes plus the configured exposure axes
    #[must_use]
    pub fn with_exposures(metrics: MetricsConfig, stratification: &StratificationConfig) -> Self {
        let mut stratifier = Self::new(metrics);
        for (slot, source) in [
            (Slot::VitaminA, &stratification.vitamin_a),
            (Slot::Zinc, &stratification.zinc),
        ] {
            if let Some(source) = source {
                stratifier.axes.push(Axis {
                    slot,
                    labels: EXPOSURE_CATEGORIES.to_vec(),
                    source: Some(source.clone()),
                });
            }
        }
        stratifier
    }

    /// Columns needed to partition simulants
    #[must_use]
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut required = vec![columns::ALIVE];
        for axis in &self.axes {
            match axis.slot {
                Slot::Sex => required.push(columns::SEX),
                Slot::AgeGroup => required.push(columns::AGE),
                Slot::VitaminA | Slot::Zinc => {}
            }
        }
        required
    }

    /// Declare the stratifier's inputs on behalf of `observer`
    ///
    /// Extra axes may be pipelines or columns; anything that is not a
    /// registered pipeline is looked up as a column when observed.
    pub fn setup(&self, observer: &str, builder: &mut SimulationBuilder<'_>) {
        builder.reads_columns(observer, &self.required_columns());
        for source in self.axes.iter().filter_map(|axis| axis.source.as_deref()) {
            log::debug!("'{observer}' stratifies by '{source}'");
        }
    }

    /// Year slot for observations made at `ctx`'s clock
    #[must_use]
    pub fn year(&self, ctx: &EvalContext<'_>) -> Option<i32> {
        self.by_year.then(|| ctx.clock.year())
    }

    /// Every stratum, in key order
    #[must_use]
    pub fn strata(&self) -> Vec<Stratum> {
        if self.axes.is_empty() {
            return vec![Stratum::default()];
        }
        self.axes
            .iter()
            .map(|axis| 0..axis.labels.len())
            .multi_cartesian_product()
            .map(|positions| self.stratum(&positions))
            .collect()
    }

    fn stratum(&self, positions: &[usize]) -> Stratum {
        let mut stratum = Stratum::default();
        for (axis, &position) in self.axes.iter().zip(positions) {
            let label = Some(axis.labels[position]);
            match axis.slot {
                Slot::Sex => stratum.sex = label,
                Slot::AgeGroup => stratum.age_group = label,
                Slot::VitaminA => stratum.vitamin_a = label,
                Slot::Zinc => stratum.zinc = label,
            }
        }
        stratum
    }

    fn axis_positions(
        &self,
        axis: &Axis,
        ctx: &EvalContext<'_>,
        demographics: &RecordBatch,
        index: &[usize],
    ) -> Result<Vec<Option<usize>>> {
        match axis.slot {
            Slot::AgeGroup => Ok(float_values(demographics, columns::AGE)?
                .into_iter()
                .map(|age| AgeGroup::of(age).map(|g| g as usize))
                .collect()),
            Slot::Sex => Ok(string_values(demographics, columns::SEX)?
                .iter()
                .map(|sex| SEXES.iter().position(|(value, _)| value == sex))
                .collect()),
            Slot::VitaminA | Slot::Zinc => {
                let source = axis.source.as_deref().ok_or_else(|| {
                    Error::configuration("exposure stratification axis without a source")
                })?;
                let categories = if ctx.values.contains(source) {
                    ctx.value(source, index)?.into_category()?
                } else {
                    string_values(&ctx.population.view(&[source])?.get(index)?, source)?
                };
                Ok(categories
                    .iter()
                    .map(|c| axis.labels.iter().position(|label| label == c))
                    .collect())
            }
        }
    }

    /// Group the simulants of `index` by stratum
    ///
    /// Simulants whose value falls outside an axis (e.g. age five or older)
    /// belong to no stratum.
    pub fn partition(&self, ctx: &EvalContext<'_>, index: &[usize]) -> Result<Partition> {
        let strata = self.strata();
        let demographic_columns = self
            .required_columns()
            .into_iter()
            .filter(|c| *c != columns::ALIVE)
            .collect::<Vec<_>>();
        let demographics = ctx.population.view(&demographic_columns)?.get(index)?;
        let mut ids: Vec<Option<usize>> = vec![Some(0); index.len()];
        for axis in &self.axes {
            let positions = self.axis_positions(axis, ctx, &demographics, index)?;
            let radix = axis.labels.len();
            for (id, position) in ids.iter_mut().zip(positions) {
                *id = match (*id, position) {
                    (Some(id), Some(position)) => Some(id * radix + position),
                    _ => None,
                };
            }
        }
        let mut members = vec![Vec::new(); strata.len()];
        for (position, id) in ids.into_iter().enumerate() {
            if let Some(id) = id {
                members[id].push(position);
            }
        }
        Ok(Partition { strata, members })
    }
}
