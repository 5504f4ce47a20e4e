//! World-plane data model: coordinates, realms, tiles, plants and items.
//!
//! Only the data shapes live here; growth timers and placement rules belong
//! to the simulation layer, not the ledger.

use serde::{Deserialize, Serialize};

use crate::crypto::Address;
use crate::location::{Region, RegionIndex};

/// Tiles per realm edge.
pub const REALM_SIZE: u32 = 8;
/// Realms per region edge.
pub const REGION_SIZE: u32 = 8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Coordinate(pub u32);

impl Coordinate {
    pub fn realm_index(self) -> RealmIndex {
        RealmIndex(self.0 / REALM_SIZE)
    }

    /// Checked addition; the world plane has no negative coordinates.
    pub fn checked_add(self, delta: i64) -> Option<Coordinate> {
        let shifted = i64::from(self.0) + delta;
        u32::try_from(shifted).ok().map(Coordinate)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct RealmIndex(pub u32);

impl RealmIndex {
    pub fn region_index(self) -> RegionIndex {
        RegionIndex(self.0 / REGION_SIZE)
    }
}

/// A claimable square of `REALM_SIZE` x `REALM_SIZE` tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    pub owner: Address,
    pub ix: RealmIndex,
    pub iy: RealmIndex,
}

impl Realm {
    pub fn region(&self) -> Region {
        Region {
            rx: self.ix.region_index(),
            ry: self.iy.region_index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantType {
    Wheat,
    Corn,
    Carrot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlantGrowth {
    Seed,
    Sprout,
    HalfGrown,
    Grown,
}

impl PlantGrowth {
    pub fn next(self) -> Option<PlantGrowth> {
        match self {
            PlantGrowth::Seed => Some(PlantGrowth::Sprout),
            PlantGrowth::Sprout => Some(PlantGrowth::HalfGrown),
            PlantGrowth::HalfGrown => Some(PlantGrowth::Grown),
            PlantGrowth::Grown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowingPlant {
    pub owner: Address,
    pub plant_type: PlantType,
    pub growth: PlantGrowth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tile")]
pub enum Tile {
    #[serde(rename = "DefaultTile")]
    Default { x: Coordinate, y: Coordinate },
    #[serde(rename = "Plot")]
    Plot {
        x: Coordinate,
        y: Coordinate,
        plant: Option<GrowingPlant>,
    },
}

impl Tile {
    pub fn x(&self) -> Coordinate {
        match self {
            Tile::Default { x, .. } | Tile::Plot { x, .. } => *x,
        }
    }

    pub fn y(&self) -> Coordinate {
        match self {
            Tile::Default { y, .. } | Tile::Plot { y, .. } => *y,
        }
    }

    pub fn region(&self) -> Region {
        Region {
            rx: self.x().realm_index().region_index(),
            ry: self.y().realm_index().region_index(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item")]
pub enum Item {
    #[serde(rename = "Seed")]
    Seed { owner: Address, plant_type: PlantType },
    #[serde(rename = "HarvestedPlant")]
    HarvestedPlant { owner: Address, plant_type: PlantType },
    #[serde(rename = "RealmClaimPaper")]
    RealmClaimPaper { owner: Address },
    #[serde(rename = "Hoe")]
    Hoe { owner: Address },
    #[serde(rename = "IntroductionGift")]
    IntroductionGift {
        owner: Address,
        claim_papers: u32,
        hoes: u32,
        seeds: Vec<PlantType>,
    },
}

impl Item {
    pub fn owner(&self) -> &Address {
        match self {
            Item::Seed { owner, .. }
            | Item::HarvestedPlant { owner, .. }
            | Item::RealmClaimPaper { owner }
            | Item::Hoe { owner }
            | Item::IntroductionGift { owner, .. } => owner,
        }
    }
}
