/// Execution variant registry
///
/// The single table mapping a requested workflow type name to the shape of
/// execution unit that runs it. Both the HTTP layer and the early-return
/// client resolve names here, so an unknown name is rejected in one place.

use crate::transaction::DispatchMode;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Supported execution unit shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Early return, steps dispatched to remote workers
    UpdateWithStartRegularActivities,
    /// Early return, steps run co-located with the unit
    UpdateWithStartLocalActivities,
    /// No early return, steps dispatched to remote workers
    RegularActivities,
    /// No early return, steps run co-located with the unit
    LocalActivities,
    /// No early return, co-located steps, eager start on a local worker
    EagerLocalActivities,
}

/// How a variant executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub variant: Variant,
    pub name: &'static str,
    /// Whether the caller is acknowledged right after init via an update
    pub early_return: bool,
    /// Where the unit's steps run
    pub dispatch: DispatchMode,
    /// Whether start asks the backend to hand the unit to a local worker directly
    pub eager: bool,
}

static VARIANTS: [VariantDescriptor; 5] = [
    VariantDescriptor {
        variant: Variant::UpdateWithStartRegularActivities,
        name: "UpdateWithStartRegularActivities",
        early_return: true,
        dispatch: DispatchMode::Remote,
        eager: false,
    },
    VariantDescriptor {
        variant: Variant::UpdateWithStartLocalActivities,
        name: "UpdateWithStartLocalActivities",
        early_return: true,
        dispatch: DispatchMode::Local,
        eager: false,
    },
    VariantDescriptor {
        variant: Variant::RegularActivities,
        name: "RegularActivities",
        early_return: false,
        dispatch: DispatchMode::Remote,
        eager: false,
    },
    VariantDescriptor {
        variant: Variant::LocalActivities,
        name: "LocalActivities",
        early_return: false,
        dispatch: DispatchMode::Local,
        eager: false,
    },
    VariantDescriptor {
        variant: Variant::EagerLocalActivities,
        name: "EagerLocalActivities",
        early_return: false,
        dispatch: DispatchMode::Local,
        eager: true,
    },
];

/// Requested workflow type is not in the registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid workflow type: {0}")]
pub struct UnknownVariant(pub String);

impl Variant {
    pub fn descriptor(self) -> &'static VariantDescriptor {
        let row = match self {
            Variant::UpdateWithStartRegularActivities => 0,
            Variant::UpdateWithStartLocalActivities => 1,
            Variant::RegularActivities => 2,
            Variant::LocalActivities => 3,
            Variant::EagerLocalActivities => 4,
        };
        &VARIANTS[row]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Every registered variant, in table order
    pub fn all() -> impl Iterator<Item = &'static VariantDescriptor> {
        VARIANTS.iter()
    }

    /// Resolve a workflow type name
    pub fn resolve(name: &str) -> Result<&'static VariantDescriptor, UnknownVariant> {
        VARIANTS
            .iter()
            .find(|descriptor| descriptor.name == name)
            .ok_or_else(|| UnknownVariant(name.to_string()))
    }
}

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::resolve(s).map(|descriptor| descriptor.variant)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_round_trips_through_its_name() {
        for descriptor in Variant::all() {
            assert_eq!(descriptor.variant.descriptor(), descriptor);
            assert_eq!(descriptor.name.parse::<Variant>(), Ok(descriptor.variant));
            assert_eq!(descriptor.variant.to_string(), descriptor.name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = "MoneyTransfer".parse::<Variant>().unwrap_err();

        assert_eq!(err, UnknownVariant("MoneyTransfer".to_string()));
        assert_eq!(err.to_string(), "Invalid workflow type: MoneyTransfer");
    }

    #[test]
    fn test_descriptor_shapes() {
        let regular = Variant::resolve("UpdateWithStartRegularActivities").unwrap();
        assert!(regular.early_return);
        assert_eq!(regular.dispatch, DispatchMode::Remote);

        let eager = Variant::resolve("EagerLocalActivities").unwrap();
        assert!(!eager.early_return);
        assert!(eager.eager);
        assert_eq!(eager.dispatch, DispatchMode::Local);

        let early_return: Vec<_> = Variant::all().filter(|d| d.early_return).map(|d| d.name).collect();
        assert_eq!(
            early_return,
            vec!["UpdateWithStartRegularActivities", "UpdateWithStartLocalActivities"]
        );
    }

    #[test]
    fn test_serde_uses_registry_names() {
        let json = serde_json::to_string(&Variant::LocalActivities).unwrap();
        assert_eq!(json, "\"LocalActivities\"");
    }
}
