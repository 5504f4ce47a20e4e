//! Player action model and the polymorphic record payload.
//!
//! The set of action kinds is closed at compile time; each variant carries a
//! stable string tag so peers built from different revisions agree on
//! decoding.

use serde::{Deserialize, Serialize};

use crate::location::{Locator, Region, RegionBlockReference};
use crate::world::{Item, Realm, Tile};

/// Seeds a freshly generated chunk of tiles into a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGenesisAction {
    pub tiles: Vec<Tile>,
    pub region: Region,
}

/// Claims a realm by consuming a realm claim paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRealmAction {
    pub realm: Realm,
    pub paper: Item,
}

/// Turns a default tile into a plot, consuming a hoe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlotAction {
    pub plot: Tile,
    pub hoe: Item,
}

/// Plants a seed item on a plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAction {
    pub plot: Tile,
    pub seed: Item,
}

/// Advances the growth stage of the plant on a plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowAction {
    pub plot: Tile,
}

/// Harvests a grown plant, yielding the plant and follow-up seeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestAction {
    pub plant: Item,
    pub seeds: Vec<Item>,
    pub plot: Tile,
}

/// Grants the starter gift to a new player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionAction {
    pub gift: Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    ChunkGenesis,
    ClaimRealm,
    CreatePlot,
    Seed,
    Grow,
    Harvest,
    Introduction,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::ChunkGenesis => "ChunkGenesisAction",
            ActionKind::ClaimRealm => "ClaimRealmAction",
            ActionKind::CreatePlot => "CreatePlotAction",
            ActionKind::Seed => "SeedAction",
            ActionKind::Grow => "GrowAction",
            ActionKind::Harvest => "HarvestAction",
            ActionKind::Introduction => "IntroductionAction",
        }
    }
}

/// One unit of game intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    #[serde(rename = "ChunkGenesisAction")]
    ChunkGenesis(ChunkGenesisAction),
    #[serde(rename = "ClaimRealmAction")]
    ClaimRealm(ClaimRealmAction),
    #[serde(rename = "CreatePlotAction")]
    CreatePlot(CreatePlotAction),
    #[serde(rename = "SeedAction")]
    Seed(SeedAction),
    #[serde(rename = "GrowAction")]
    Grow(GrowAction),
    #[serde(rename = "HarvestAction")]
    Harvest(HarvestAction),
    #[serde(rename = "IntroductionAction")]
    Introduction(IntroductionAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ChunkGenesis(_) => ActionKind::ChunkGenesis,
            Action::ClaimRealm(_) => ActionKind::ClaimRealm,
            Action::CreatePlot(_) => ActionKind::CreatePlot,
            Action::Seed(_) => ActionKind::Seed,
            Action::Grow(_) => ActionKind::Grow,
            Action::Harvest(_) => ActionKind::Harvest,
            Action::Introduction(_) => ActionKind::Introduction,
        }
    }

    /// Maps the action's spatial target to the chain it belongs to. Actions
    /// without a spatial target route to the stem chain.
    pub fn locator(&self) -> Locator {
        match self {
            Action::ChunkGenesis(action) => Locator::Region {
                region: action.region,
            },
            Action::ClaimRealm(action) => Locator::Region {
                region: action.realm.region(),
            },
            Action::CreatePlot(action) => Locator::Region {
                region: action.plot.region(),
            },
            Action::Seed(action) => Locator::Region {
                region: action.plot.region(),
            },
            Action::Grow(action) => Locator::Region {
                region: action.plot.region(),
            },
            Action::Harvest(action) => Locator::Region {
                region: action.plot.region(),
            },
            Action::Introduction(_) => Locator::Stem,
        }
    }
}

/// Everything a committed record may carry: a player action on a region
/// chain, or a region checkpoint on the stem chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RecordContent {
    #[serde(rename = "ChunkGenesisAction")]
    ChunkGenesis(ChunkGenesisAction),
    #[serde(rename = "ClaimRealmAction")]
    ClaimRealm(ClaimRealmAction),
    #[serde(rename = "CreatePlotAction")]
    CreatePlot(CreatePlotAction),
    #[serde(rename = "SeedAction")]
    Seed(SeedAction),
    #[serde(rename = "GrowAction")]
    Grow(GrowAction),
    #[serde(rename = "HarvestAction")]
    Harvest(HarvestAction),
    #[serde(rename = "IntroductionAction")]
    Introduction(IntroductionAction),
    #[serde(rename = "RegionBlockReference")]
    RegionRef(RegionBlockReference),
}

impl RecordContent {
    pub fn tag(&self) -> &'static str {
        match self {
            RecordContent::ChunkGenesis(_) => "ChunkGenesisAction",
            RecordContent::ClaimRealm(_) => "ClaimRealmAction",
            RecordContent::CreatePlot(_) => "CreatePlotAction",
            RecordContent::Seed(_) => "SeedAction",
            RecordContent::Grow(_) => "GrowAction",
            RecordContent::Harvest(_) => "HarvestAction",
            RecordContent::Introduction(_) => "IntroductionAction",
            RecordContent::RegionRef(_) => "RegionBlockReference",
        }
    }

    pub fn locator(&self) -> Locator {
        match self {
            RecordContent::RegionRef(_) => Locator::Stem,
            other => other
                .as_action()
                .map(|action| action.locator())
                .unwrap_or(Locator::Stem),
        }
    }

    pub fn as_action(&self) -> Option<Action> {
        match self.clone() {
            RecordContent::ChunkGenesis(action) => Some(Action::ChunkGenesis(action)),
            RecordContent::ClaimRealm(action) => Some(Action::ClaimRealm(action)),
            RecordContent::CreatePlot(action) => Some(Action::CreatePlot(action)),
            RecordContent::Seed(action) => Some(Action::Seed(action)),
            RecordContent::Grow(action) => Some(Action::Grow(action)),
            RecordContent::Harvest(action) => Some(Action::Harvest(action)),
            RecordContent::Introduction(action) => Some(Action::Introduction(action)),
            RecordContent::RegionRef(_) => None,
        }
    }

    pub fn as_region_ref(&self) -> Option<&RegionBlockReference> {
        match self {
            RecordContent::RegionRef(reference) => Some(reference),
            _ => None,
        }
    }
}

impl From<Action> for RecordContent {
    fn from(action: Action) -> Self {
        match action {
            Action::ChunkGenesis(action) => RecordContent::ChunkGenesis(action),
            Action::ClaimRealm(action) => RecordContent::ClaimRealm(action),
            Action::CreatePlot(action) => RecordContent::CreatePlot(action),
            Action::Seed(action) => RecordContent::Seed(action),
            Action::Grow(action) => RecordContent::Grow(action),
            Action::Harvest(action) => RecordContent::Harvest(action),
            Action::Introduction(action) => RecordContent::Introduction(action),
        }
    }
}
