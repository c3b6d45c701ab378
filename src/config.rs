use std::fmt;
use std::str::FromStr;

/// A `coordinate:dimension` declaration: `coordinate` is constant for each
/// value of `dimension` and is projected onto that dimension's axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateDecl {
    pub coordinate: String,
    pub dimension: String,
}

impl CoordinateDecl {
    pub fn new(coordinate: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self {
            coordinate: coordinate.into(),
            dimension: dimension.into(),
        }
    }
}

impl FromStr for CoordinateDecl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (coordinate, dimension) = s
            .split_once(':')
            .ok_or_else(|| format!("expected COORDINATE:DIMENSION, got '{s}'"))?;
        let (coordinate, dimension) = (coordinate.trim(), dimension.trim());
        if coordinate.is_empty() || dimension.is_empty() || dimension.contains(':') {
            return Err(format!("expected COORDINATE:DIMENSION, got '{s}'"));
        }
        Ok(Self::new(coordinate, dimension))
    }
}

impl fmt::Display for CoordinateDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coordinate, self.dimension)
    }
}

/// Declarations steering the dataset builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Dimension fields, in axis order after `time`.
    pub dimensions: Vec<String>,
    pub coordinates: Vec<CoordinateDecl>,
}

impl CompileOptions {
    pub fn new(dimensions: Vec<String>, coordinates: Vec<CoordinateDecl>) -> Self {
        Self {
            dimensions,
            coordinates,
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn with_coordinate(
        mut self,
        coordinate: impl Into<String>,
        dimension: impl Into<String>,
    ) -> Self {
        self.coordinates.push(CoordinateDecl::new(coordinate, dimension));
        self
    }

    pub fn is_dimension(&self, field: &str) -> bool {
        self.dimensions.iter().any(|d| d == field)
    }

    pub fn is_coordinate(&self, field: &str) -> bool {
        self.coordinates.iter().any(|c| c.coordinate == field)
    }
}
