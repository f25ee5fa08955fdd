use polars::prelude::*;
use serde::{Deserialize, Serialize};

use custom_float::PositiveNonZeroF64;
use string_intern::Intern;

mod plan;
mod polars_support;
mod topology;

pub use plan::{OptSpec, QuerySpec, RunCase, SweepBlock, SweepPlan};
pub use polars_support::ToSeriesColumn;
pub use topology::waxman_params;

/// Defines a record type together with a "vectorized" companion where
/// every field is an optional list. The companion selects subsets of
/// records: a record matches when each present list contains the
/// record's value. An absent optional field never matches a present
/// list. Records also convert to single-row DataFrames, with typed
/// nulls for absent optional fields.
macro_rules! make_vectorized {
    ($original:ident, $vectorized:ident, { $($field:ident : $typ:ty),* $(,)? },
     optional:{$($opt_field:ident : $opt_typ:ty),* $(,)?}) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $original {
            $(pub $field: $typ),*,
            $(pub $opt_field: Option<$opt_typ>),*
        }

        #[derive(Debug, Clone, Default, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $vectorized {
            $(pub $field: Option<Vec<$typ>>),*,
            $(pub $opt_field: Option<Vec<$opt_typ>>),*,
        }

        impl $vectorized {
            pub fn contains(&self, item: &$original) -> bool {
                $(
                    if let Some(wanted) = &self.$field
                        && !wanted.contains(&item.$field)
                    {
                        return false;
                    }
                )*
                $(
                    if let Some(wanted) = &self.$opt_field {
                        match &item.$opt_field {
                            Some(actual) => {
                                if !wanted.contains(actual) {
                                    return false;
                                }
                            }
                            None => return false,
                        }
                    }
                )*
                true
            }
        }

        impl $original {
            pub fn to_df(&self) -> Result<DataFrame, polars::error::PolarsError> {
                let columns: Vec<Column> = vec![
                    $(
                        self.$field.to_series_column(stringify!($field).into()).into(),
                    )*
                    $(
                        self.$opt_field.to_series_column(stringify!($opt_field).into()).into(),
                    )*
                ];
                DataFrame::new(columns)
            }
        }
    };
}

make_vectorized!(SweepRun, SweepRunFilter, {
    sweep: Intern,
    query: Intern,
    query_flags: String,
    topology: Intern,
    num_nodes: u64,
    iteration: u64,
    opt_name: Intern,
    opt_flags: String,
    tar_file: String,
} , optional:{
    timeout: u64,
    exit_code: i64,
    waxman_alpha: PositiveNonZeroF64,
    waxman_beta: PositiveNonZeroF64,
});
