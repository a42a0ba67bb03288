//! Substitution funnel for scanner-data price indexes.
//!
//! An offer that lost its item in the current period is matched to a
//! substitute drawn from the items of its commodity and geography. The
//! candidate pool is narrowed through named filter sets (occupied items,
//! outlet and unit of measure, relaunch distance, sales rank, name
//! similarity, description distance) and the substitute is sampled from the
//! narrowest non-empty set.

pub mod batch;
pub mod components;
pub mod config;
pub mod error;
pub mod filter;
pub mod funnel;
pub mod geography;
pub mod loader;
pub mod offers;
pub mod pool;
pub mod records;
pub mod sampling;
pub mod selector;
pub mod types;
pub mod util;

pub use batch::{build_offer_maps, BatchOutput, OfferMaps, Substituter, SubstitutionInput};
pub use config::{BatchConfig, FunnelConfig};
pub use error::{FilterError, SamplingError, SubstitutionError, SubstitutionResult};
pub use funnel::{build_outlet_sets, Funnel, FunnelAudit, Outcome, Resolution};
pub use geography::{GeoLevel, Geography, OutletRecord};
pub use offers::{Commodity, Offer, OfferBook, OfferPeriodRecord, OfferStatus};
pub use pool::{CandidatePool, MaskMode, NormMode};
pub use records::{MatchedOfferRecord, RunSummary, SuggestionRow};
pub use sampling::{sample, SamplingStrategy};
pub use types::{CatalogEntry, Item, ItemCatalog, ItemId, ScoreKey, SetName, NO_ITEM};
