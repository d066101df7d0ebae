//! Symmetry constraints on kernel coefficients.
//!
//! Each relation is a reflection of kernel coordinates. Applying a relation
//! copies the value at every index `i` onto its mirror `j` when `j > i`, so
//! the lower index always drives. Active relations are applied one after
//! another in their declared order; later relations overwrite earlier ones.
//! That sequential overwrite is observable when relations conflict and must
//! not be replaced by a constraint solve.
//!
//! `Full` is always applied last and sets every non-center weight to the
//! value at index 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kernel::{Dimension, Kernel};

/// A named symmetry relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symmetry {
    /// 2-D mirror across the vertical axis (`x -> 2 - x`).
    Vertical,
    /// 2-D mirror across the horizontal axis (`y -> 2 - y`).
    Horizontal,
    /// 2-D mirror across the `/` diagonal.
    ForwardDiagonal,
    /// 2-D mirror across the `\` diagonal.
    BackwardDiagonal,
    /// 3-D mirror across the plane normal to x.
    PlaneX,
    /// 3-D mirror across the plane normal to y.
    PlaneY,
    /// 3-D mirror across the plane normal to z.
    PlaneZ,
    /// 3-D swap of x and y.
    DiagonalXy,
    /// 3-D anti-diagonal reflection in the xy plane.
    AntiDiagonalXy,
    /// 3-D swap of x and z.
    DiagonalXz,
    /// 3-D anti-diagonal reflection in the xz plane.
    AntiDiagonalXz,
    /// 3-D swap of y and z.
    DiagonalYz,
    /// 3-D anti-diagonal reflection in the yz plane.
    AntiDiagonalYz,
    /// Every non-center weight equals weight 0.
    Full,
}

const ORDER_2D: [Symmetry; 5] = [
    Symmetry::Vertical,
    Symmetry::Horizontal,
    Symmetry::ForwardDiagonal,
    Symmetry::BackwardDiagonal,
    Symmetry::Full,
];

const ORDER_3D: [Symmetry; 10] = [
    Symmetry::PlaneX,
    Symmetry::PlaneY,
    Symmetry::PlaneZ,
    Symmetry::DiagonalXy,
    Symmetry::AntiDiagonalXy,
    Symmetry::DiagonalXz,
    Symmetry::AntiDiagonalXz,
    Symmetry::DiagonalYz,
    Symmetry::AntiDiagonalYz,
    Symmetry::Full,
];

impl Symmetry {
    /// Relations available in a dimension, in application order.
    pub fn declared_order(dimension: Dimension) -> &'static [Symmetry] {
        match dimension {
            Dimension::Two => &ORDER_2D,
            Dimension::Three => &ORDER_3D,
        }
    }

    /// Stable name used in preset symmetry flags.
    pub fn name(&self) -> &'static str {
        match self {
            Symmetry::Vertical => "vertical",
            Symmetry::Horizontal => "horizontal",
            Symmetry::ForwardDiagonal => "forward_diagonal",
            Symmetry::BackwardDiagonal => "backward_diagonal",
            Symmetry::PlaneX => "plane_x",
            Symmetry::PlaneY => "plane_y",
            Symmetry::PlaneZ => "plane_z",
            Symmetry::DiagonalXy => "diagonal_xy",
            Symmetry::AntiDiagonalXy => "anti_diagonal_xy",
            Symmetry::DiagonalXz => "diagonal_xz",
            Symmetry::AntiDiagonalXz => "anti_diagonal_xz",
            Symmetry::DiagonalYz => "diagonal_yz",
            Symmetry::AntiDiagonalYz => "anti_diagonal_yz",
            Symmetry::Full => "full",
        }
    }

    /// Look a relation up by its flag name.
    pub fn from_name(name: &str) -> Option<Symmetry> {
        ORDER_2D
            .iter()
            .chain(ORDER_3D.iter())
            .copied()
            .find(|s| s.name() == name)
    }

    /// Mirror image of kernel coordinates `(x, y, z)`, each in `0..3`.
    ///
    /// `Full` has no single image and maps coordinates to themselves.
    fn reflect(&self, (x, y, z): (usize, usize, usize)) -> (usize, usize, usize) {
        match self {
            Symmetry::Vertical | Symmetry::PlaneX => (2 - x, y, z),
            Symmetry::Horizontal | Symmetry::PlaneY => (x, 2 - y, z),
            Symmetry::PlaneZ => (x, y, 2 - z),
            Symmetry::BackwardDiagonal | Symmetry::DiagonalXy => (y, x, z),
            Symmetry::ForwardDiagonal | Symmetry::AntiDiagonalXy => (2 - y, 2 - x, z),
            Symmetry::DiagonalXz => (z, y, x),
            Symmetry::AntiDiagonalXz => (2 - z, y, 2 - x),
            Symmetry::DiagonalYz => (x, z, y),
            Symmetry::AntiDiagonalYz => (x, 2 - z, 2 - y),
            Symmetry::Full => (x, y, z),
        }
    }

    /// Kernel index mirrored by this relation.
    pub fn image(&self, dimension: Dimension, index: usize) -> usize {
        let (x, y, z) = self.reflect(dimension.coords(index));
        dimension.index(x, y, z)
    }

    /// `(driving, dependent)` index pairs, in ascending driving order.
    pub fn pairs(&self, dimension: Dimension) -> Vec<(usize, usize)> {
        let len = dimension.kernel_len();
        if *self == Symmetry::Full {
            let center = dimension.center_index();
            return (1..len).filter(|&i| i != center).map(|i| (0, i)).collect();
        }
        (0..len)
            .filter_map(|i| {
                let j = self.image(dimension, i);
                (j > i).then_some((i, j))
            })
            .collect()
    }

    fn apply(&self, dimension: Dimension, weights: &mut [f32]) {
        for (driving, dependent) in self.pairs(dimension) {
            weights[dependent] = weights[driving];
        }
    }
}

/// The active relations for one dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymmetrySet {
    dimension: Dimension,
    active: Vec<Symmetry>,
}

impl SymmetrySet {
    /// No relation active.
    pub fn none(dimension: Dimension) -> Self {
        Self {
            dimension,
            active: Vec::new(),
        }
    }

    /// Build from a list of relations. Relations not defined for the
    /// dimension are dropped.
    pub fn new(dimension: Dimension, relations: &[Symmetry]) -> Self {
        let mut set = Self::none(dimension);
        for &r in relations {
            set.set(r, true);
        }
        set
    }

    /// The dimension this set applies to.
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Enable or disable a relation. Relations of the other dimension are
    /// ignored.
    pub fn set(&mut self, relation: Symmetry, enabled: bool) {
        let order = Symmetry::declared_order(self.dimension);
        if !order.contains(&relation) {
            return;
        }
        self.active.retain(|&r| r != relation);
        if enabled {
            self.active.push(relation);
            self.active
                .sort_by_key(|r| order.iter().position(|o| o == r).unwrap_or(usize::MAX));
        }
    }

    /// Whether a relation is active.
    pub fn is_active(&self, relation: Symmetry) -> bool {
        self.active.contains(&relation)
    }

    /// Active relations in declared order.
    pub fn active(&self) -> &[Symmetry] {
        &self.active
    }

    /// Whether no relation is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Flag map for the preset record: every relation of the dimension.
    pub fn to_flags(&self) -> BTreeMap<String, bool> {
        Symmetry::declared_order(self.dimension)
            .iter()
            .map(|s| (s.name().to_string(), self.is_active(*s)))
            .collect()
    }

    /// Inverse of [`SymmetrySet::to_flags`]. Unknown names are skipped.
    pub fn from_flags(dimension: Dimension, flags: &BTreeMap<String, bool>) -> Self {
        let mut set = Self::none(dimension);
        for (name, &on) in flags {
            if let Some(relation) = Symmetry::from_name(name) {
                set.set(relation, on);
            }
        }
        set
    }

    /// Indices forced equal to `index` by the active relations, `index`
    /// included.
    pub fn orbit(&self, index: usize) -> Vec<usize> {
        let dimension = self.dimension;
        let center = dimension.center_index();
        if self.is_active(Symmetry::Full) {
            if index == center {
                return vec![center];
            }
            return (0..dimension.kernel_len()).filter(|&i| i != center).collect();
        }

        let mut orbit = vec![index];
        let mut cursor = 0;
        while cursor < orbit.len() {
            let current = orbit[cursor];
            for relation in &self.active {
                let image = relation.image(dimension, current);
                if !orbit.contains(&image) {
                    orbit.push(image);
                }
            }
            cursor += 1;
        }
        orbit.sort_unstable();
        orbit
    }
}

/// One pass over the active relations in declared order.
fn apply_once(set: &SymmetrySet, weights: &mut [f32]) {
    for relation in &set.active {
        relation.apply(set.dimension, weights);
    }
}

/// Enforce the active relations on a kernel.
///
/// One pass in declared order: each relation overwrites its dependent
/// indices with the current value of their driving index, seeing the
/// overwrites of the relations before it. Overlapping relations are not
/// reconciled, so for some combinations (vertical with backward diagonal)
/// a second application changes the kernel again.
pub fn apply_symmetries(kernel: &Kernel, set: &SymmetrySet) -> Kernel {
    let mut out = kernel.clone();
    if set.is_empty() || kernel.dimension() != set.dimension {
        return out;
    }
    apply_once(set, out.weights_mut());
    out
}

/// Edit one coefficient and re-broadcast symmetry-derived values.
///
/// `current_index` is written first together with every index the active
/// relations tie it to, so the enforcement pass cannot overwrite the edit.
pub fn edit_coefficient(
    kernel: &Kernel,
    current_index: usize,
    value: f32,
    set: &SymmetrySet,
) -> Kernel {
    let mut out = kernel.clone();
    if current_index >= out.weights().len() {
        return out;
    }
    let tied = if kernel.dimension() == set.dimension {
        set.orbit(current_index)
    } else {
        vec![current_index]
    };
    for i in tied {
        out.weights_mut()[i] = value;
    }
    apply_symmetries(&out, set)
}
