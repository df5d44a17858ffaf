//! Pattern representations shared by both miners, and the summarised
//! [`MiningResult`] each one emits.

/// One bar of a normalised candle pattern: open/high/low/close as ratios to
/// the pattern anchor's open, and volume as a ratio to the anchor's volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleFitElement {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A candle pattern: `L` consecutive anchor-relative bars, a momentum sign,
/// and an optional ordinal signature (the total ordering of its 4*L OHLC
/// price levels).
#[derive(Debug, Clone, PartialEq)]
pub struct CandlePattern {
    pub elements: Vec<CandleFitElement>,
    pub momentum_sign: i8,
    pub signature: Option<String>,
}

impl CandlePattern {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// One vertex of a zigzag pattern, relative to the zigzag's first extremum:
/// bar offset, price ratio, volume ratio, and whether it is a local minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZigzagElement {
    pub time_offset: i64,
    pub price_ratio: f64,
    pub volume_ratio: f64,
    pub is_minimum: bool,
}

/// A zigzag pattern: `K` consecutive alternating extrema. The first element
/// always carries `time_offset=0, price_ratio=1, volume_ratio=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ZigzagPattern {
    pub elements: Vec<ZigzagElement>,
    pub momentum_sign: i8,
}

impl ZigzagPattern {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// The shape a [`MiningResult`] was built from — either a candle or a
/// zigzag pattern. Results carry the pattern's shape, not its source
/// position.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternShape {
    Candle(CandlePattern),
    Zigzag(ZigzagPattern),
}

/// Inferential statistics summarising every match found for a base pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStats {
    pub count: usize,
    pub mean: f64,
    pub sigma: f64,
    /// Smallest alpha in the Student's-t ladder at which H0 (mean = 0) is
    /// rejected; 1.0 if the ladder never rejects.
    pub mean_p: f64,
    pub mean_pos: f64,
    pub mean_neg: f64,
    pub pos_returns: usize,
    pub neg_returns: usize,
    pub min_return: f64,
    pub max_return: f64,
    pub median: f64,
    /// Lowest low seen across the holding horizon of every match; not
    /// maintained for zigzag results.
    pub min_low: Option<f64>,
    /// Highest high seen across the holding horizon of every match; not
    /// maintained for zigzag results.
    pub max_high: Option<f64>,
    /// Two-sided normal-approximation sign-test p-value.
    pub p: f64,
}

/// A single mined pattern with its inferential statistics. Owned by the
/// mining invocation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningResult {
    pub shape: PatternShape,
    pub stats: ReturnStats,
}

impl MiningResult {
    pub fn count(&self) -> usize {
        self.stats.count
    }
}
