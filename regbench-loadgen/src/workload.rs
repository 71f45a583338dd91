//! A module for defining a [`Workload`] that drives a registry benchmark.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;
use regbench_types::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::template::{BodyTemplate, IdGenerator, IdScheme, NewDescriptor};

/// Operations in the order of [`Weights::as_array`].
const WEIGHTED_OPERATIONS: [Operation; 4] = [
    Operation::Create,
    Operation::Read,
    Operation::List,
    Operation::SearchPaginated,
];

/// Operations substituted for a `read` while nothing has been created yet.
const READ_FALLBACKS: [Operation; 2] = [Operation::List, Operation::SearchPaginated];

/// Errors building a [`Workload`].
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The operation weights cannot form a distribution.
    #[error("invalid operation weights: {0}")]
    InvalidWeights(String),
}

/// Relative selection weights of the operations.
///
/// Weights do not need to sum up to one, selection is proportional.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Weights {
    /// Weight of `create`.
    pub create: f64,
    /// Weight of `read`.
    pub read: f64,
    /// Weight of `list`.
    pub list: f64,
    /// Weight of `search_paginated`.
    pub search_paginated: f64,
}

impl Weights {
    fn as_array(&self) -> [f64; 4] {
        [self.create, self.read, self.list, self.search_paginated]
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            create: 0.4,
            read: 0.2,
            list: 0.2,
            search_paginated: 0.2,
        }
    }
}

/// A builder for creating a [`Workload`].
#[derive(Debug)]
pub struct WorkloadBuilder {
    seed: u64,
    iterations: u64,
    prewarm: u64,
    weights: Weights,
    page_limit: u32,
    template: BodyTemplate,
    ids: IdScheme,
}

impl WorkloadBuilder {
    /// The seed of the random stream driving operation selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The total number of operations to issue.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// The number of leading operations that are forced to be creates.
    ///
    /// This is clamped to the number of iterations.
    pub fn prewarm(mut self, prewarm: u64) -> Self {
        self.prewarm = prewarm;
        self
    }

    /// The ratio between the operations after the prewarm phase.
    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// The `limit` parameter of paginated searches.
    pub fn page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// The body template for creates.
    pub fn template(mut self, template: BodyTemplate) -> Self {
        self.template = template;
        self
    }

    /// How identifiers for new descriptors are generated.
    pub fn ids(mut self, ids: IdScheme) -> Self {
        self.ids = ids;
        self
    }

    /// Creates the workload, seeding a [`SmallRng`] from the configured seed.
    pub fn build(self) -> Result<Workload, WorkloadError> {
        let rng = SmallRng::seed_from_u64(self.seed);
        self.build_with_rng(rng)
    }

    /// Creates the workload with the given random stream.
    ///
    /// The configured seed is still used for seeded identifiers.
    pub fn build_with_rng<R: Rng>(self, rng: R) -> Result<Workload<R>, WorkloadError> {
        let weights = self.weights.as_array();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(WorkloadError::InvalidWeights(
                "weights must be finite numbers".into(),
            ));
        }
        let action_distribution = WeightedIndex::new(weights)
            .map_err(|err| WorkloadError::InvalidWeights(err.to_string()))?;

        Ok(Workload {
            iterations: self.iterations,
            prewarm: self.prewarm.min(self.iterations),
            page_limit: self.page_limit,

            rng,
            action_distribution,

            template: self.template,
            ids: IdGenerator::new(&self.ids, self.seed),
            pool: IdentifierPool::default(),
        })
    }
}

/// Identifiers of descriptors that were created successfully during a run.
///
/// The pool only ever grows. Reads and searches sample from it without removing anything.
#[derive(Debug, Default)]
pub struct IdentifierPool {
    descriptors: Vec<String>,
    sub_resources: Vec<String>,
}

impl IdentifierPool {
    /// Number of top-level descriptor identifiers.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no descriptor has been created yet.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Number of sub-resource identifiers.
    pub fn sub_resource_len(&self) -> usize {
        self.sub_resources.len()
    }

    /// Top-level descriptor identifiers, in creation order.
    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    /// Sub-resource identifiers, in creation order.
    pub fn sub_resources(&self) -> &[String] {
        &self.sub_resources
    }

    fn push(&mut self, descriptor: &NewDescriptor) {
        self.descriptors.push(descriptor.id.clone());
        self.sub_resources
            .extend(descriptor.sub_resource_ids.iter().cloned());
    }

    /// Uniformly samples a descriptor identifier. Does not consume randomness when empty.
    fn sample(&self, rng: &mut impl Rng) -> Option<String> {
        if self.descriptors.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..self.descriptors.len());
        Some(self.descriptors[idx].clone())
    }
}

/// Specification of a benchmark run against a registry.
///
/// All random decisions are drawn from a single stream `R`, in iteration order. Given the same seed
/// and the same sequence of successful creates, a workload yields the same sequence of actions.
#[derive(Debug)]
pub struct Workload<R = SmallRng> {
    /// Total number of operations.
    iterations: u64,
    /// Number of leading operations forced to `create`.
    prewarm: u64,
    /// Page size of paginated searches.
    page_limit: u32,

    /// The RNG driving all our distributions.
    rng: R,
    /// A distribution that generates operations, indexing into [`WEIGHTED_OPERATIONS`].
    action_distribution: WeightedIndex<f64>,

    template: BodyTemplate,
    ids: IdGenerator,
    pool: IdentifierPool,
}

impl Workload {
    /// Constructs a new workload builder with defaults.
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder {
            seed: 42,
            iterations: 10_000,
            prewarm: 1_000,
            weights: Weights::default(),
            page_limit: 100,
            template: BodyTemplate::default(),
            ids: IdScheme::default(),
        }
    }
}

impl<R: Rng> Workload<R> {
    /// Total number of operations in this workload.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Number of leading operations that are forced to be creates.
    pub fn prewarm(&self) -> u64 {
        self.prewarm
    }

    /// The identifiers created so far.
    pub fn pool(&self) -> &IdentifierPool {
        &self.pool
    }

    /// Selects and prepares the action for iteration `iter`.
    ///
    /// Must be called once per iteration, in order, after the outcome of the previous action has
    /// been reported via [`record_created`](Self::record_created).
    pub fn next_action(&mut self, iter: u64) -> Action {
        if iter < self.prewarm {
            return self.create_action();
        }

        match WEIGHTED_OPERATIONS[self.action_distribution.sample(&mut self.rng)] {
            Operation::Create => self.create_action(),
            Operation::Read => match self.pool.sample(&mut self.rng) {
                Some(id) => Action::Read { id },
                // reading by id is meaningless before anything exists
                None => {
                    let idx = self.rng.random_range(0..READ_FALLBACKS.len());
                    match READ_FALLBACKS[idx] {
                        Operation::List => Action::List,
                        _ => self.search_action(),
                    }
                }
            },
            Operation::List => Action::List,
            Operation::SearchPaginated => self.search_action(),
        }
    }

    /// Adds the identifiers of a successful create to the pool.
    ///
    /// This must only be called once the registry confirmed the create.
    pub fn record_created(&mut self, descriptor: &NewDescriptor) {
        self.pool.push(descriptor);
    }

    fn create_action(&mut self) -> Action {
        Action::Create(self.template.instantiate(&mut self.ids))
    }

    fn search_action(&mut self) -> Action {
        let cursor = match self.pool.sample(&mut self.rng) {
            Some(id) => id,
            // a well-formed cursor that does not refer to anything
            None => self.ids.descriptor_id(),
        };

        Action::SearchPaginated {
            limit: self.page_limit,
            cursor,
        }
    }
}

/// An action that can be performed by the workload.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Submit a new descriptor.
    Create(NewDescriptor),
    /// Look up a descriptor by its identifier.
    Read {
        /// The raw (unencoded) identifier.
        id: String,
    },
    /// List all descriptors.
    List,
    /// List one page of descriptors, starting at a cursor.
    SearchPaginated {
        /// The page size.
        limit: u32,
        /// The descriptor identifier to start from.
        cursor: String,
    },
}

impl Action {
    /// The operation this action performs.
    pub fn operation(&self) -> Operation {
        match self {
            Action::Create(_) => Operation::Create,
            Action::Read { .. } => Operation::Read,
            Action::List => Operation::List,
            Action::SearchPaginated { .. } => Operation::SearchPaginated,
        }
    }

    /// The request body sent by this action, if any.
    pub fn request_body(&self) -> Option<&Value> {
        match self {
            Action::Create(descriptor) => Some(&descriptor.body),
            _ => None,
        }
    }
}
