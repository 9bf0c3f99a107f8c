//! Gene and genome types for the critter population.
//!
//! A [`Genome`] is an ordered set of uniquely named [`Gene`]s. Genes carry their
//! own mutation policy and crossover dominance; the operations that consume
//! randomness live in `compute::evolution`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Names of the genes in the standard critter genome.
pub mod names {
    pub const STRENGTH: &str = "Strength";
    pub const JUMP_STRENGTH: &str = "Jump Strength";
    pub const SPEED: &str = "Speed";
    pub const JUMP_CHANCE: &str = "Jump Chance";
    pub const RANDOM_MOTION_CHANCE: &str = "Random Motion Chance";
    pub const RANDOM_MOTION_NEG_X: &str = "Random Motion -X Strength";
    pub const RANDOM_MOTION_POS_X: &str = "Random Motion +X Strength";
    pub const RANDOM_MOTION_NEG_Y: &str = "Random Motion -Y Strength";
    pub const RANDOM_MOTION_POS_Y: &str = "Random Motion +Y Strength";
    pub const RANDOM_MOTION_NEG_Z: &str = "Random Motion -Z Strength";
    pub const RANDOM_MOTION_POS_Z: &str = "Random Motion +Z Strength";
    pub const MAX_FOOD: &str = "Max Food";
    pub const CLOSEST_FOOD_FIRST: &str = "Closest Food First";
    pub const RANDOM_FOOD_FIRST: &str = "Random Food First";
    pub const CHECKS_EATEN: &str = "Checks Eaten";
    pub const CLOSE_THRESHOLD: &str = "Close Threshold";
    pub const CHANGE_MIND_CHANCE: &str = "Change Mind Chance";
    pub const EAT_OTHER_TRIBES_CHANCE: &str = "Eat Other Tribes Chance";
    pub const CANNIBALISM_CHANCE: &str = "Cannibalism Chance";
    pub const CANNIBALISM_WAIT: &str = "Cannibalism Wait";
    pub const SMART_CANNIBALISM: &str = "Smart Cannibalism";
    pub const NEST_OFFSET_X: &str = "x-nest-offset";
    pub const NEST_OFFSET_Y: &str = "y-nest-offset";

    /// Every standard gene, in genome order.
    pub const ALL: [&str; 23] = [
        STRENGTH,
        JUMP_STRENGTH,
        SPEED,
        JUMP_CHANCE,
        RANDOM_MOTION_CHANCE,
        RANDOM_MOTION_NEG_X,
        RANDOM_MOTION_POS_X,
        RANDOM_MOTION_NEG_Y,
        RANDOM_MOTION_POS_Y,
        RANDOM_MOTION_NEG_Z,
        RANDOM_MOTION_POS_Z,
        MAX_FOOD,
        CLOSEST_FOOD_FIRST,
        RANDOM_FOOD_FIRST,
        CHECKS_EATEN,
        CLOSE_THRESHOLD,
        CHANGE_MIND_CHANCE,
        EAT_OTHER_TRIBES_CHANCE,
        CANNIBALISM_CHANCE,
        CANNIBALISM_WAIT,
        SMART_CANNIBALISM,
        NEST_OFFSET_X,
        NEST_OFFSET_Y,
    ];
}

/// Value carried by a gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneValue {
    /// Numeric trait, bounded by the gene's `min`/`max` when both are set.
    Number(f32),
    /// Categorical trait, drawn from the gene's `options`.
    Choice(String),
}

impl GeneValue {
    /// Numeric payload, if numeric.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            GeneValue::Number(v) => Some(*v),
            GeneValue::Choice(_) => None,
        }
    }

    /// Categorical payload, if categorical.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            GeneValue::Choice(s) => Some(s),
            GeneValue::Number(_) => None,
        }
    }
}

/// A single heritable trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Trait name, unique within a genome.
    pub name: String,
    /// Current value.
    pub value: GeneValue,
    /// Lower bound for numeric values.
    #[serde(default)]
    pub min: Option<f32>,
    /// Upper bound for numeric values.
    #[serde(default)]
    pub max: Option<f32>,
    /// Probability (0.0-1.0) that a call to `mutate` changes the value.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Half-width of the uniform noise added by a numeric mutation.
    #[serde(default = "default_mutation_step")]
    pub mutation_step: f32,
    /// Allowed values for categorical genes.
    #[serde(default)]
    pub options: Vec<String>,
    /// Crossover priority; the higher side passes its value on.
    #[serde(default = "default_dominance")]
    pub dominance: f32,
    /// Number of crossovers in this gene's lineage.
    #[serde(default)]
    pub generation: u32,
    /// Names of the two genes this one was crossed from.
    #[serde(default)]
    pub parent_names: Vec<String>,
    /// Inactive genes never mutate.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_mutation_rate() -> f32 {
    0.5
}
fn default_mutation_step() -> f32 {
    0.1
}
fn default_dominance() -> f32 {
    1.0
}
fn default_active() -> bool {
    true
}

impl Gene {
    /// Numeric gene bounded to `[min, max]`.
    pub fn number(name: impl Into<String>, value: f32, min: f32, max: f32) -> Self {
        Self {
            name: name.into(),
            value: GeneValue::Number(value),
            min: Some(min),
            max: Some(max),
            mutation_rate: default_mutation_rate(),
            mutation_step: default_mutation_step(),
            options: Vec::new(),
            dominance: default_dominance(),
            generation: 0,
            parent_names: Vec::new(),
            active: true,
        }
    }

    /// Numeric gene with no bounds.
    pub fn unbounded(name: impl Into<String>, value: f32) -> Self {
        Self {
            min: None,
            max: None,
            ..Self::number(name, value, 0.0, 0.0)
        }
    }

    /// Categorical gene choosing among `options`.
    pub fn choice(name: impl Into<String>, value: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            value: GeneValue::Choice(value.into()),
            min: None,
            max: None,
            options,
            ..Self::number(name, 0.0, 0.0, 0.0)
        }
    }

    /// Set the probability that `mutate` changes the value.
    pub fn with_mutation_rate(mut self, rate: f32) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Set the half-width of numeric mutation noise.
    pub fn with_mutation_step(mut self, step: f32) -> Self {
        self.mutation_step = step;
        self
    }

    /// Set crossover priority.
    pub fn with_dominance(mut self, dominance: f32) -> Self {
        self.dominance = dominance;
        self
    }

    /// Both bounds, if both are set.
    pub fn bounds(&self) -> Option<(f32, f32)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    /// Numeric value, if this is a numeric gene.
    pub fn number_value(&self) -> Option<f32> {
        self.value.as_number()
    }

    /// Clamp a numeric value into the gene's bounds.
    pub fn clamp_value(&mut self) {
        let bounds = self.bounds();
        if let (GeneValue::Number(v), Some((min, max))) = (&mut self.value, bounds) {
            *v = v.clamp(min, max);
        }
    }

    /// Check the constructed invariants of this gene.
    pub fn validate(&self) -> Result<(), GenomeError> {
        if let Some((min, max)) = self.bounds() {
            if min > max {
                return Err(GenomeError::InvertedBounds {
                    name: self.name.clone(),
                    min,
                    max,
                });
            }
        }
        let finite = [self.min, self.max, self.number_value()]
            .into_iter()
            .flatten()
            .all(f32::is_finite);
        if !finite {
            return Err(GenomeError::NonFinite(self.name.clone()));
        }
        if !self.mutation_step.is_finite() {
            return Err(GenomeError::InvalidMutationStep {
                name: self.name.clone(),
                step: self.mutation_step,
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(GenomeError::InvalidMutationRate {
                name: self.name.clone(),
                rate: self.mutation_rate,
            });
        }
        if matches!(self.value, GeneValue::Choice(_)) && self.options.is_empty() {
            return Err(GenomeError::MissingOptions(self.name.clone()));
        }
        Ok(())
    }
}

/// Constructed-invariant violations for genes and genomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenomeError {
    #[error("Gene '{name}' has min ({min}) > max ({max})")]
    InvertedBounds { name: String, min: f32, max: f32 },
    #[error("Gene '{name}' has mutation rate {rate} outside [0, 1]")]
    InvalidMutationRate { name: String, rate: f32 },
    #[error("Gene '{name}' has non-finite mutation step {step}")]
    InvalidMutationStep { name: String, step: f32 },
    #[error("Gene '{0}' has a non-finite value or bound")]
    NonFinite(String),
    #[error("Gene '{0}' is declared more than once")]
    DuplicateGene(String),
    #[error("Categorical gene '{0}' has no options")]
    MissingOptions(String),
}

/// Anything a genome can be projected onto.
///
/// Implementors map gene names to their own typed fields and return whether
/// the name was recognised.
pub trait GeneTarget {
    fn set_gene(&mut self, name: &str, value: &GeneValue) -> bool;
}

/// Ordered, uniquely named collection of genes owned by one individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Gene>", into = "Vec<Gene>")]
pub struct Genome {
    genes: Vec<Gene>,
}

impl Genome {
    /// Build a genome, validating every gene and clamping values into bounds.
    pub fn new(mut genes: Vec<Gene>) -> Result<Self, GenomeError> {
        let mut seen = HashMap::with_capacity(genes.len());
        for gene in &mut genes {
            gene.validate()?;
            if seen.insert(gene.name.clone(), ()).is_some() {
                return Err(GenomeError::DuplicateGene(gene.name.clone()));
            }
            gene.clamp_value();
        }
        Ok(Self { genes })
    }

    /// The default critter genome.
    pub fn standard() -> Self {
        use names::*;

        let genes = vec![
            Gene::number(STRENGTH, 0.5, 0.5, 2.0),
            Gene::number(JUMP_STRENGTH, 1.1, 1.0, 5.0),
            Gene::number(SPEED, 1.1, 1.0, 5.0),
            Gene::number(JUMP_CHANCE, 0.5, 0.0, 100.0),
            Gene::number(RANDOM_MOTION_CHANCE, 1.0, 0.0, 100.0),
            Gene::number(RANDOM_MOTION_NEG_X, 0.1, 0.1, 10.0),
            Gene::number(RANDOM_MOTION_POS_X, 0.1, 0.1, 10.0),
            Gene::number(RANDOM_MOTION_NEG_Y, 0.1, 0.1, 10.0),
            Gene::number(RANDOM_MOTION_POS_Y, 0.1, 0.1, 10.0),
            Gene::number(RANDOM_MOTION_NEG_Z, 0.1, 0.1, 10.0),
            Gene::number(RANDOM_MOTION_POS_Z, 0.1, 0.1, 10.0),
            // How much a critter carries before it must return home.
            Gene::number(MAX_FOOD, 0.7, 0.7, 10.0),
            Gene::number(CLOSEST_FOOD_FIRST, 0.5, 0.0, 1.0),
            Gene::number(RANDOM_FOOD_FIRST, 0.5, 0.0, 1.0),
            Gene::number(CHECKS_EATEN, 0.5, 0.0, 1.0),
            Gene::number(CLOSE_THRESHOLD, 30.0, 10.0, 500.0),
            Gene::number(CHANGE_MIND_CHANCE, 0.0001, 0.0, 0.1).with_mutation_step(0.0002),
            Gene::number(EAT_OTHER_TRIBES_CHANCE, 0.0001, 0.0, 1.0).with_mutation_step(0.001),
            Gene::number(CANNIBALISM_CHANCE, 0.0001, 0.0, 1.0).with_mutation_step(0.001),
            Gene::number(CANNIBALISM_WAIT, 3.0, 0.0, 100.0).with_mutation_step(3.0),
            Gene::number(SMART_CANNIBALISM, 0.1, 0.0, 1.0).with_mutation_step(0.01),
            Gene::number(NEST_OFFSET_X, 0.0, -200.0, 200.0).with_mutation_step(100.0),
            Gene::number(NEST_OFFSET_Y, 0.0, -200.0, 200.0).with_mutation_step(100.0),
        ];

        Self { genes }
    }

    /// Genes in declaration order.
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub(crate) fn genes_mut(&mut self) -> &mut [Gene] {
        &mut self.genes
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Exact-name lookup.
    pub fn gene(&self, name: &str) -> Option<&Gene> {
        self.genes.iter().find(|g| g.name == name)
    }

    /// Mutable exact-name lookup.
    pub fn gene_mut(&mut self, name: &str) -> Option<&mut Gene> {
        self.genes.iter_mut().find(|g| g.name == name)
    }

    /// Value of `name`, falling back to the catalog default when this genome
    /// does not carry the gene.
    ///
    /// Missing genes are not an error: an individual without an optional trait
    /// behaves as if it had the weakest declared version of it.
    pub fn value(&self, name: &str, catalog: &GeneCatalog) -> GeneValue {
        self.gene(name)
            .map(|g| g.value.clone())
            .unwrap_or_else(|| GeneValue::Number(catalog.default_for(name)))
    }

    /// Numeric value of `name` with the same fallback as [`Genome::value`].
    /// Categorical genes read as the catalog default.
    pub fn number(&self, name: &str, catalog: &GeneCatalog) -> f32 {
        self.value(name, catalog)
            .as_number()
            .unwrap_or_else(|| catalog.default_for(name))
    }

    /// Write every gene's current value onto the same-named field of `target`.
    ///
    /// Returns the number of genes the target recognised.
    pub fn apply_to<T: GeneTarget + ?Sized>(&self, target: &mut T) -> usize {
        let mut applied = 0;
        for gene in &self.genes {
            if target.set_gene(&gene.name, &gene.value) {
                applied += 1;
            } else {
                log::trace!("Gene '{}' has no projection on target", gene.name);
            }
        }
        applied
    }
}

impl Default for Genome {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<Gene>> for Genome {
    type Error = GenomeError;

    fn try_from(genes: Vec<Gene>) -> Result<Self, Self::Error> {
        Self::new(genes)
    }
}

impl From<Genome> for Vec<Gene> {
    fn from(genome: Genome) -> Self {
        genome.genes
    }
}

/// Registry of every gene name any genome has declared.
///
/// Records the minimum of the first declaration of each name; used as the
/// soft default for lookups of genes an individual does not carry.
#[derive(Debug, Clone, Default)]
pub struct GeneCatalog {
    minimums: HashMap<String, Option<f32>>,
}

impl GeneCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the standard genome.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.declare(&Genome::standard());
        catalog
    }

    /// Record every gene of `genome`. Earlier declarations win.
    pub fn declare(&mut self, genome: &Genome) {
        for gene in genome.genes() {
            self.minimums
                .entry(gene.name.clone())
                .or_insert(gene.min);
        }
    }

    /// Whether `name` has been declared.
    pub fn contains(&self, name: &str) -> bool {
        self.minimums.contains_key(name)
    }

    /// Declared minimum for `name`, or 0 for unknown or unbounded genes.
    pub fn default_for(&self, name: &str) -> f32 {
        self.minimums.get(name).copied().flatten().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.minimums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minimums.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_genome_is_valid() {
        let genome = Genome::standard();
        assert_eq!(genome.len(), 23);
        assert!(Genome::new(genome.genes().to_vec()).is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = Genome::new(vec![Gene::number("Broken", 1.0, 5.0, 2.0)]);
        assert!(matches!(
            result,
            Err(GenomeError::InvertedBounds { ref name, .. }) if name == "Broken"
        ));
    }

    #[test]
    fn test_duplicate_gene_rejected() {
        let result = Genome::new(vec![
            Gene::number("Speed", 1.0, 0.0, 2.0),
            Gene::number("Speed", 1.5, 0.0, 2.0),
        ]);
        assert_eq!(result, Err(GenomeError::DuplicateGene("Speed".into())));
    }

    #[test]
    fn test_construction_clamps_values() {
        let genome = Genome::new(vec![Gene::number("Speed", 9.0, 0.0, 2.0)]).unwrap();
        assert_eq!(genome.gene("Speed").unwrap().number_value(), Some(2.0));
    }

    #[test]
    fn test_categorical_requires_options() {
        let gene = Gene::choice("Diet", "plants", Vec::new());
        assert_eq!(
            Genome::new(vec![gene]),
            Err(GenomeError::MissingOptions("Diet".into()))
        );
    }

    #[test]
    fn test_missing_gene_falls_back_to_catalog_minimum() {
        let catalog = GeneCatalog::standard();
        let sparse = Genome::new(vec![Gene::number(names::SPEED, 3.0, 1.0, 5.0)]).unwrap();

        assert_eq!(sparse.number(names::SPEED, &catalog), 3.0);
        assert_eq!(sparse.number(names::MAX_FOOD, &catalog), 0.7);
        assert_eq!(sparse.number("Never Declared", &catalog), 0.0);
    }

    #[test]
    fn test_catalog_keeps_first_declaration() {
        let mut catalog = GeneCatalog::new();
        catalog.declare(&Genome::new(vec![Gene::number("Size", 1.0, 1.0, 3.0)]).unwrap());
        catalog.declare(&Genome::new(vec![Gene::number("Size", 5.0, 4.0, 9.0)]).unwrap());
        assert_eq!(catalog.default_for("Size"), 1.0);
    }

    #[derive(Default)]
    struct SpeedOnly {
        speed: f32,
    }

    impl GeneTarget for SpeedOnly {
        fn set_gene(&mut self, name: &str, value: &GeneValue) -> bool {
            match (name, value.as_number()) {
                ("Speed", Some(v)) => {
                    self.speed = v;
                    true
                }
                _ => false,
            }
        }
    }

    #[test]
    fn test_apply_to_projects_known_genes() {
        let genome = Genome::standard();
        let mut target = SpeedOnly::default();
        assert_eq!(genome.apply_to(&mut target), 1);
        assert!((target.speed - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_serialization_validates() {
        let json = serde_json::to_string(&Genome::standard()).unwrap();
        let parsed: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Genome::standard());

        let broken = r#"[{"name":"X","value":1.0,"min":3.0,"max":1.0}]"#;
        assert!(serde_json::from_str::<Genome>(broken).is_err());
    }

    #[test]
    fn test_overflowing_mutation_step_rejected() {
        // 1e39 does not fit in an f32 and reads back as infinity.
        let json = r#"{"name":"Speed","value":1.0,"min":1.0,"max":5.0,"mutation_rate":1.0,"mutation_step":1e39}"#;
        let gene: Gene = serde_json::from_str(json).unwrap();
        assert!(gene.mutation_step.is_infinite());
        assert!(matches!(
            gene.validate(),
            Err(GenomeError::InvalidMutationStep { ref name, .. }) if name == "Speed"
        ));
        assert!(Genome::new(vec![gene]).is_err());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let gene = Gene::unbounded("Drift", f32::INFINITY);
        assert_eq!(gene.validate(), Err(GenomeError::NonFinite("Drift".into())));

        let gene = Gene::number("Drift", 0.0, f32::NEG_INFINITY, 1.0);
        assert_eq!(gene.validate(), Err(GenomeError::NonFinite("Drift".into())));
    }
}
