//! Possibly-dynamic shape descriptors.
//!
//! A [`PartialShape`] either has dynamic rank (nothing known) or a fixed
//! rank whose individual [`Dimension`]s may still be dynamic. The matcher
//! only ever asks one question of shapes: could these two describe the same
//! value (`compatible`)?

use std::fmt;

use smallvec::SmallVec;

/// One dimension of a partial shape: a fixed extent or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension(Option<u64>);

impl Dimension {
    pub const fn fixed(extent: u64) -> Self {
        Self(Some(extent))
    }

    pub const fn dynamic() -> Self {
        Self(None)
    }

    pub const fn is_static(&self) -> bool {
        self.0.is_some()
    }

    pub const fn extent(&self) -> Option<u64> {
        self.0
    }

    pub const fn compatible(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => true,
        }
    }
}

impl From<u64> for Dimension {
    fn from(extent: u64) -> Self {
        Self::fixed(extent)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(extent) => write!(f, "{extent}"),
            None => f.write_str("?"),
        }
    }
}

/// Shape with possibly-dynamic rank and dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape {
    /// `None` encodes dynamic rank.
    dims: Option<SmallVec<[Dimension; 4]>>,
}

impl PartialShape {
    /// Shape about which nothing is known.
    pub fn dynamic() -> Self {
        Self { dims: None }
    }

    /// Fully static shape.
    pub fn fixed(extents: &[u64]) -> Self {
        Self { dims: Some(extents.iter().copied().map(Dimension::fixed).collect()) }
    }

    /// Static rank with the given (possibly dynamic) dimensions.
    pub fn with_dims(dims: impl IntoIterator<Item = Dimension>) -> Self {
        Self { dims: Some(dims.into_iter().collect()) }
    }

    /// Scalar shape (static rank zero).
    pub fn scalar() -> Self {
        Self { dims: Some(SmallVec::new()) }
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(SmallVec::len)
    }

    pub fn is_dynamic(&self) -> bool {
        match &self.dims {
            None => true,
            Some(dims) => dims.iter().any(|dim| !dim.is_static()),
        }
    }

    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    /// Whether two shapes could describe the same value: dynamic rank is
    /// compatible with everything, static ranks must agree and every
    /// dimension pair must be compatible.
    pub fn compatible(&self, other: &Self) -> bool {
        match (&self.dims, &other.dims) {
            (Some(lhs), Some(rhs)) => {
                lhs.len() == rhs.len() && lhs.iter().zip(rhs.iter()).all(|(l, r)| l.compatible(r))
            }
            _ => true,
        }
    }

    /// Shape of one part when the first dimension is split `parts` ways.
    /// `None` when the rank, the first dimension, or divisibility is not
    /// known to allow it.
    pub(crate) fn split_first_dim(&self, parts: usize) -> Option<Self> {
        let dims = self.dims.as_ref()?;
        let first = dims.first()?.extent()?;
        if parts == 0 || first % parts as u64 != 0 {
            return None;
        }
        let mut split: SmallVec<[Dimension; 4]> = dims.clone();
        split[0] = Dimension::fixed(first / parts as u64);
        Some(Self { dims: Some(split) })
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => f.write_str("?"),
            Some(dims) => {
                f.write_str("{")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{dim}")?;
                }
                f.write_str("}")
            }
        }
    }
}
