use log::debug;

use crate::cost::{Cost, EPS, FARAWAY};
use crate::graph::{ArcId, Graph, Node};
use crate::tree::ExtTree;

use super::{EqForbiddenEdges, ExtRedError, Result};

/// A special distance as seen by the engine. `Known` carries a proper
/// value in `[0, FARAWAY)`; `Infeasible` means no alternative exists;
/// `Unknown` means the oracle has not computed the pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sd {
    Known(Cost),
    Infeasible,
    Unknown,
}

impl Sd {
    /// Decodes the oracle's raw value: `-1` is unknown, `FARAWAY` (or
    /// beyond) infeasible, anything else non-negative a proper distance.
    /// Any other value is an oracle failure.
    pub fn try_from_oracle(raw: Cost) -> Result<Self> {
        if (raw + 1.0).abs() <= EPS {
            Ok(Sd::Unknown)
        } else if raw < 0.0 {
            Err(ExtRedError::OracleValue(raw))
        } else if raw >= FARAWAY {
            Ok(Sd::Infeasible)
        } else {
            Ok(Sd::Known(raw))
        }
    }

    /// Re-reads a distance from slot storage, where `FARAWAY` encodes
    /// "nothing usable" (unknown and infeasible alike).
    pub fn from_stored(stored: Cost) -> Self {
        debug_assert!(stored >= 0.0);

        if stored >= FARAWAY {
            Sd::Unknown
        } else {
            Sd::Known(stored)
        }
    }

    #[inline(always)]
    pub fn known(self) -> Option<Cost> {
        match self {
            Sd::Known(c) => Some(c),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_known(self) -> bool {
        matches!(self, Sd::Known(_))
    }

    /// Storage encoding: anything non-proper becomes `FARAWAY`.
    #[inline(always)]
    pub fn or_faraway(self) -> Cost {
        match self {
            Sd::Known(c) => c,
            _ => FARAWAY,
        }
    }
}

/// Distance-data collaborator of the engine. All methods return the raw
/// sentinel encoding decoded by [`Sd::try_from_oracle`]: a value in
/// `[0, FARAWAY]` or `-1` for "not computed".
pub trait DistOracle {
    /// Special distance between `u` and `v`, checking the distance from
    /// `v` to `u` as well if no opposite distance is known.
    fn sd_double(&self, g: &Graph, u: Node, v: Node) -> Cost;

    /// Like [`DistOracle::sd_double`], but every edge in `forbidden`
    /// must be avoided.
    fn sd_double_forbidden(
        &self,
        g: &Graph,
        forbidden: &EqForbiddenEdges,
        u: Node,
        v: Node,
    ) -> Cost;

    /// Like [`DistOracle::sd_double_forbidden`] with `arc_forbidden`
    /// additionally excluded; used to confirm equality rule-outs. The
    /// oracle may stop early once the distance exceeds `dist_eq`.
    fn sd_double_forbidden_eq(
        &self,
        g: &Graph,
        forbidden: &EqForbiddenEdges,
        dist_eq: Cost,
        arc_forbidden: ArcId,
        u: Node,
        v: Node,
    ) -> Cost;
}

/// Special distance from `u` to `v`, refined by the prize-collecting
/// cache when one is marked from `u`.
pub(crate) fn get_sd<O: DistOracle>(
    g: &Graph,
    oracle: &O,
    tree: &ExtTree,
    u: Node,
    v: Node,
) -> Result<Sd> {
    let mut sd = Sd::try_from_oracle(oracle.sd_double(g, u, v))?;

    let pcsd = tree.pcsd_to_node(v);
    if pcsd > -0.5 {
        let improves = match sd {
            Sd::Known(c) => pcsd < c,
            Sd::Infeasible | Sd::Unknown => true,
        };
        if improves {
            debug!("pc special distance update {u}->{v}: {pcsd}");
            sd = Sd::Known(pcsd);
        }
    }

    Ok(sd)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn oracle_decoding() {
        assert_eq!(Sd::try_from_oracle(-1.0).unwrap(), Sd::Unknown);
        assert_eq!(Sd::try_from_oracle(0.0).unwrap(), Sd::Known(0.0));
        assert_eq!(Sd::try_from_oracle(2.5).unwrap(), Sd::Known(2.5));
        assert_eq!(Sd::try_from_oracle(FARAWAY).unwrap(), Sd::Infeasible);
        assert!(Sd::try_from_oracle(-0.7).is_err());
    }

    #[test]
    fn storage_round_trip() {
        assert_eq!(Sd::Known(3.0).or_faraway(), 3.0);
        assert_eq!(Sd::Unknown.or_faraway(), FARAWAY);
        assert_eq!(Sd::Infeasible.or_faraway(), FARAWAY);

        assert_eq!(Sd::from_stored(3.0), Sd::Known(3.0));
        assert_eq!(Sd::from_stored(FARAWAY), Sd::Unknown);
    }
}
