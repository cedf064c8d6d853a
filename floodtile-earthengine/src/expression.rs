//! Earth Engine expression graph for the flood-detection pipeline.
//!
//! The REST API takes a computation as a tree of function invocations. Only
//! the handful of node kinds the pipeline needs are modelled.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use floodtile_core::error::{FloodtileError, Result};

/// One node of an expression tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ValueNode {
    /// A literal JSON value.
    #[serde(rename = "constantValue")]
    Constant(serde_json::Value),
    /// A list of nodes.
    #[serde(rename = "arrayValue")]
    Array {
        /// Elements
        values: Vec<ValueNode>,
    },
    /// A call to a named server-side function.
    #[serde(rename = "functionInvocationValue")]
    Invocation {
        /// Function name, e.g. `Image.select`
        #[serde(rename = "functionName")]
        function_name: String,
        /// Named arguments
        arguments: BTreeMap<String, ValueNode>,
    },
}

impl ValueNode {
    /// Wraps a literal.
    pub fn constant(value: impl Into<serde_json::Value>) -> Self {
        ValueNode::Constant(value.into())
    }

    /// Wraps a list of nodes.
    pub fn array(values: impl IntoIterator<Item = ValueNode>) -> Self {
        ValueNode::Array {
            values: values.into_iter().collect(),
        }
    }

    /// Builds a function invocation.
    pub fn invoke<'a>(
        function_name: &str,
        arguments: impl IntoIterator<Item = (&'a str, ValueNode)>,
    ) -> Self {
        ValueNode::Invocation {
            function_name: function_name.to_string(),
            arguments: arguments
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Returns the function name if this node is an invocation.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            ValueNode::Invocation { function_name, .. } => Some(function_name),
            _ => None,
        }
    }
}

/// A complete expression: a value table and the key of its result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expression {
    /// Key of the result node in `values`
    pub result: String,
    /// Named nodes
    pub values: BTreeMap<String, ValueNode>,
}

impl Expression {
    /// Creates an expression whose result is `root`.
    pub fn new(root: ValueNode) -> Self {
        let mut values = BTreeMap::new();
        values.insert("0".to_string(), root);
        Self {
            result: "0".into(),
            values,
        }
    }

    /// Returns the result node.
    pub fn root(&self) -> Option<&ValueNode> {
        self.values.get(&self.result)
    }
}

/// Parameters of the Sentinel-1 flood-detection pipeline.
///
/// The map shows where backscatter over the last month dropped well below
/// the multi-year mean for the same season on ascending passes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FloodAlgorithm {
    /// Source image collection
    pub collection: String,
    /// Polarisation that images must carry
    pub polarisation: String,
    /// End of the observation window (exclusive)
    pub stop_date: NaiveDate,
    /// Length of the observation window in months
    pub lookback_months: i64,
    /// Start of the baseline period
    pub baseline_start: NaiveDate,
    /// End of the baseline period (exclusive)
    pub baseline_end: NaiveDate,
    /// Orbit pass compared between baseline and observation
    pub orbit_pass: String,
    /// Percentile taken over the observation window
    pub percentile: f64,
    /// Lower bound of the drop scaled to 0
    pub scale_low: f64,
    /// Upper bound of the drop scaled to 1
    pub scale_high: f64,
    /// Colors for the rendered map
    pub palette: Vec<String>,
}

impl Default for FloodAlgorithm {
    fn default() -> Self {
        Self {
            collection: "COPERNICUS/S1_GRD".into(),
            polarisation: "VV".into(),
            stop_date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap_or_default(),
            lookback_months: 1,
            baseline_start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            baseline_end: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            orbit_pass: "ASCENDING".into(),
            percentile: 1.0,
            scale_low: 6.0,
            scale_high: 15.0,
            palette: vec!["cyan".into()],
        }
    }
}

impl FloodAlgorithm {
    /// Sets the end of the observation window.
    pub fn with_stop_date(mut self, stop_date: NaiveDate) -> Self {
        self.stop_date = stop_date;
        self
    }

    /// Sets the baseline period.
    pub fn with_baseline(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.baseline_start = start;
        self.baseline_end = end;
        self
    }

    /// Checks that the parameters describe a computable map.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(FloodtileError::ConfigError("collection is empty".into()));
        }
        if self.lookback_months < 1 {
            return Err(FloodtileError::ConfigError(format!(
                "lookback_months must be at least 1, got {}",
                self.lookback_months
            )));
        }
        if self.baseline_start >= self.baseline_end {
            return Err(FloodtileError::ConfigError(format!(
                "baseline start {} is not before end {}",
                self.baseline_start, self.baseline_end
            )));
        }
        if self.scale_low >= self.scale_high {
            return Err(FloodtileError::ConfigError(format!(
                "scale bounds {}..{} are empty",
                self.scale_low, self.scale_high
            )));
        }
        if self.palette.is_empty() {
            return Err(FloodtileError::ConfigError("palette is empty".into()));
        }
        Ok(())
    }

    /// Builds the expression graph for this pipeline.
    pub fn expression(&self) -> Expression {
        let stop = date(self.stop_date);
        let start = ValueNode::invoke(
            "Date.advance",
            [
                ("date", stop.clone()),
                ("delta", ValueNode::constant(-self.lookback_months)),
                ("unit", ValueNode::constant("month")),
            ],
        );

        let images = filter(
            ValueNode::invoke(
                "ImageCollection.load",
                [("id", ValueNode::constant(self.collection.as_str()))],
            ),
            ValueNode::invoke(
                "Filter.listContains",
                [
                    ("leftField", ValueNode::constant("transmitterReceiverPolarisation")),
                    ("rightValue", ValueNode::constant(self.polarisation.as_str())),
                ],
            ),
        );

        let season = ValueNode::invoke(
            "Filter.dayOfYear",
            [
                ("start", day_of_year(start.clone())),
                ("end", day_of_year(stop.clone())),
            ],
        );

        let baseline = filter(
            filter(
                filter_date(images.clone(), date(self.baseline_start), date(self.baseline_end)),
                season,
            ),
            self.pass_filter(),
        );
        let baseline = select(
            ValueNode::invoke("reduce.mean", [("collection", baseline)]),
            ["b1_mean", "b2_mean"],
        );

        let recent = filter(filter_date(images, start, stop), self.pass_filter());
        let recent = select(
            ValueNode::invoke(
                "ImageCollection.reduce",
                [
                    ("collection", recent),
                    (
                        "reducer",
                        ValueNode::invoke(
                            "Reducer.percentile",
                            [(
                                "percentiles",
                                ValueNode::array([ValueNode::constant(self.percentile)]),
                            )],
                        ),
                    ),
                ],
            ),
            ["b1", "b2"],
        );

        let drop = ValueNode::invoke(
            "Image.subtract",
            [
                ("image1", select_band(baseline, "b1_mean")),
                ("image2", select_band(recent, "b1")),
            ],
        );
        let scaled = ValueNode::invoke(
            "Image.unitScale",
            [
                ("input", drop),
                ("low", ValueNode::constant(self.scale_low)),
                ("high", ValueNode::constant(self.scale_high)),
            ],
        );

        Expression::new(ValueNode::invoke("Image.selfMask", [("image", scaled)]))
    }

    fn pass_filter(&self) -> ValueNode {
        ValueNode::invoke(
            "Filter.equals",
            [
                ("leftField", ValueNode::constant("orbitProperties_pass")),
                ("rightValue", ValueNode::constant(self.orbit_pass.as_str())),
            ],
        )
    }
}

fn date(day: NaiveDate) -> ValueNode {
    ValueNode::invoke(
        "Date",
        [("value", ValueNode::constant(day.format("%Y-%m-%d").to_string()))],
    )
}

fn day_of_year(date: ValueNode) -> ValueNode {
    ValueNode::invoke(
        "Date.getRelative",
        [
            ("date", date),
            ("unit", ValueNode::constant("day")),
            ("inUnit", ValueNode::constant("year")),
        ],
    )
}

fn filter(collection: ValueNode, predicate: ValueNode) -> ValueNode {
    ValueNode::invoke(
        "Collection.filter",
        [("collection", collection), ("filter", predicate)],
    )
}

fn filter_date(collection: ValueNode, start: ValueNode, end: ValueNode) -> ValueNode {
    let range = ValueNode::invoke("DateRange", [("start", start), ("end", end)]);
    filter(
        collection,
        ValueNode::invoke(
            "Filter.dateRangeContains",
            [
                ("leftValue", range),
                ("rightField", ValueNode::constant("system:time_start")),
            ],
        ),
    )
}

/// Keeps the first two bands under new names.
fn select(image: ValueNode, names: [&str; 2]) -> ValueNode {
    ValueNode::invoke(
        "Image.select",
        [
            ("input", image),
            (
                "bandSelectors",
                ValueNode::array([ValueNode::constant(0), ValueNode::constant(1)]),
            ),
            (
                "newNames",
                ValueNode::array(names.into_iter().map(ValueNode::constant)),
            ),
        ],
    )
}

fn select_band(image: ValueNode, band: &str) -> ValueNode {
    ValueNode::invoke(
        "Image.select",
        [
            ("input", image),
            ("bandSelectors", ValueNode::array([ValueNode::constant(band)])),
        ],
    )
}
