//! Firm+Forecast aggregation.
//!
//! Turns one planning sheet into one row per `(Part_No, Vendor_Code)`:
//!
//! 1. Trim column names.
//! 2. Resolve the demand range `Past due ..= Total_Demand` once.
//! 3. Sum the demand range over `Firm` and `Forecast` rows per key.
//! 4. Sum `Store_Qty` / `IQC_QTY` over `Firm` rows at `TH3-SHTP` and `TD3-DDK`.
//! 5. Outer-join both sites (missing side = 0) and add them up.
//! 6. Take metadata from the first row of each key.
//! 7. Left-join demand with stock, then with metadata.
//! 8. Order columns: keys, `Type`, stock, demand, everything else.
//! 9. Drop `Total_Demand` and `Site`.

use std::collections::{BTreeMap, HashMap};

use super::grouper::{first_by_key, outer_join, sum_by_key, GroupKey, KeyColumns};
use crate::error::{AggregateError, AggregateResult};
use crate::models::columns::{
    DROPPED, IQC_QTY, METADATA, PART_NO, PAST_DUE, SITE, STORE_QTY, TOTAL_DEMAND, TYPE,
    VENDOR_CODE,
};
use crate::models::{Cell, Table};

pub const FIRM: &str = "Firm";
pub const FORECAST: &str = "Forecast";
pub const FIRM_FORECAST: &str = "Firm+Forecast";
pub const SITE_TH3: &str = "TH3-SHTP";
pub const SITE_TD3: &str = "TD3-DDK";

/// Columns with their own output slot; never summed as demand.
const RESERVED: [&str; 5] = [PART_NO, VENDOR_CODE, TYPE, STORE_QTY, IQC_QTY];

// =============================================================================
// Column Layout
// =============================================================================

/// Column positions of a trimmed table, resolved once.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub keys: KeyColumns,
    pub type_col: usize,
    pub site: Option<usize>,
    pub store_qty: Option<usize>,
    pub iqc_qty: Option<usize>,
    /// `Past due` through `Total_Demand`, left to right.
    pub demand: Vec<(String, usize)>,
    /// Metadata columns outside the demand range.
    pub metadata: Vec<(String, usize)>,
}

impl ColumnLayout {
    /// Locate every column the aggregation needs.
    pub fn resolve(table: &Table) -> AggregateResult<Self> {
        let required = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| AggregateError::MissingColumn(name.to_string()))
        };

        let start = required(PAST_DUE)?;
        let end = required(TOTAL_DEMAND)?;
        let type_col = required(TYPE)?;
        let part_no = required(PART_NO)?;
        let vendor_code = required(VENDOR_CODE)?;

        if start > end {
            return Err(AggregateError::InvertedRange {
                start: PAST_DUE.to_string(),
                end: TOTAL_DEMAND.to_string(),
            });
        }

        let demand: Vec<(String, usize)> = (start..=end)
            .map(|i| (table.columns()[i].clone(), i))
            .filter(|(name, _)| !RESERVED.contains(&name.as_str()))
            .collect();

        let metadata = METADATA
            .iter()
            .filter_map(|name| table.column_index(name).map(|i| (name.to_string(), i)))
            .filter(|(_, i)| !(start..=end).contains(i))
            .collect();

        Ok(Self {
            keys: KeyColumns {
                part_no,
                vendor_code,
            },
            type_col,
            site: table.column_index(SITE),
            store_qty: table.column_index(STORE_QTY),
            iqc_qty: table.column_index(IQC_QTY),
            demand,
            metadata,
        })
    }

    /// Demand column names, left to right.
    pub fn demand_names(&self) -> impl Iterator<Item = &str> {
        self.demand.iter().map(|(name, _)| name.as_str())
    }
}

// =============================================================================
// Site Stock
// =============================================================================

/// Firm stock per site for one key.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SiteStock {
    pub store_th3: f64,
    pub iqc_th3: f64,
    pub store_td3: f64,
    pub iqc_td3: f64,
}

impl SiteStock {
    pub fn store_qty(&self) -> f64 {
        self.store_th3 + self.store_td3
    }

    pub fn iqc_qty(&self) -> f64 {
        self.iqc_th3 + self.iqc_td3
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Aggregate a planning sheet into one `Firm+Forecast` row per part and vendor.
///
/// # Errors
/// - [`AggregateError::MissingColumn`] if `Past due`, `Total_Demand`, `Type`,
///   `Part_No` or `Vendor_Code` is absent
/// - [`AggregateError::InvertedRange`] if `Past due` is right of `Total_Demand`
/// - [`AggregateError::EmptyInput`] if no keyed `Firm`/`Forecast` row exists
/// - [`AggregateError::InvalidNumber`] if a summed cell is not numeric
pub fn aggregate(mut table: Table) -> AggregateResult<Table> {
    table.trim_columns();
    let layout = ColumnLayout::resolve(&table)?;

    let demand = firm_forecast_demand(&table, &layout)?;
    if demand.is_empty() {
        return Err(AggregateError::EmptyInput);
    }

    let stock = site_stock(&table, &layout)?;
    let metadata = first_by_key(&table, layout.keys);

    Ok(assemble(&layout, &demand, &stock, &metadata))
}

/// Demand sums over `Firm` and `Forecast` rows, aligned with `layout.demand`.
pub fn firm_forecast_demand(
    table: &Table,
    layout: &ColumnLayout,
) -> AggregateResult<BTreeMap<GroupKey, Vec<f64>>> {
    let cols: Vec<(String, Option<usize>)> = layout
        .demand
        .iter()
        .map(|(name, i)| (name.clone(), Some(*i)))
        .collect();

    sum_by_key(table, layout.keys, &cols, |row| {
        is_text(&row[layout.type_col], FIRM) || is_text(&row[layout.type_col], FORECAST)
    })
}

/// Firm stock at both sites, outer-joined on the key.
///
/// Without a `Site` column no row belongs to either site and the result is empty.
pub fn site_stock(
    table: &Table,
    layout: &ColumnLayout,
) -> AggregateResult<BTreeMap<GroupKey, SiteStock>> {
    let Some(site_col) = layout.site else {
        return Ok(BTreeMap::new());
    };

    let cols = [
        (STORE_QTY.to_string(), layout.store_qty),
        (IQC_QTY.to_string(), layout.iqc_qty),
    ];
    let firm_at = |site: &str| {
        sum_by_key(table, layout.keys, &cols, |row| {
            is_text(&row[layout.type_col], FIRM) && is_text(&row[site_col], site)
        })
    };

    let th3 = firm_at(SITE_TH3)?;
    let td3 = firm_at(SITE_TD3)?;

    Ok(outer_join(&th3, &td3, cols.len())
        .into_iter()
        .map(|(key, (th3, td3))| {
            let stock = SiteStock {
                store_th3: th3[0],
                iqc_th3: th3[1],
                store_td3: td3[0],
                iqc_td3: td3[1],
            };
            (key, stock)
        })
        .collect())
}

/// Join the pieces and lay out the final columns.
fn assemble(
    layout: &ColumnLayout,
    demand: &BTreeMap<GroupKey, Vec<f64>>,
    stock: &BTreeMap<GroupKey, SiteStock>,
    metadata: &HashMap<GroupKey, &[Cell]>,
) -> Table {
    let total_pos = layout
        .demand
        .iter()
        .position(|(name, _)| name == TOTAL_DEMAND);

    let mut columns: Vec<String> = [PART_NO, VENDOR_CODE, TYPE, STORE_QTY, IQC_QTY]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(
        layout
            .demand_names()
            .filter(|name| *name != TOTAL_DEMAND)
            .map(String::from),
    );
    if total_pos.is_some() {
        columns.push(TOTAL_DEMAND.to_string());
    }
    columns.extend(layout.metadata.iter().map(|(name, _)| name.clone()));

    let mut table = Table::new(columns);

    for (key, sums) in demand {
        let site = stock.get(key);
        let source = metadata.get(key);

        let mut row = vec![
            key.part_no.to_cell(),
            key.vendor_code.to_cell(),
            Cell::Text(FIRM_FORECAST.to_string()),
            site.map_or(Cell::Empty, |s| Cell::Number(s.store_qty())),
            site.map_or(Cell::Empty, |s| Cell::Number(s.iqc_qty())),
        ];
        row.extend(
            sums.iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != total_pos)
                .map(|(_, v)| Cell::Number(*v)),
        );
        if let Some(pos) = total_pos {
            row.push(Cell::Number(sums[pos]));
        }
        row.extend(layout.metadata.iter().map(|(_, col)| {
            source
                .and_then(|cells| cells.get(*col))
                .cloned()
                .unwrap_or_default()
        }));

        table.push_row(row);
    }

    table.drop_columns(&DROPPED);
    table
}

fn is_text(cell: &Cell, expected: &str) -> bool {
    cell.as_text() == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 10] = [
        "Part_No",
        "Vendor_Code",
        "Type",
        "Site",
        "Store_Qty",
        "IQC_QTY",
        "Past due",
        "W01",
        "Total_Demand",
        "Buyer",
    ];

    #[allow(clippy::too_many_arguments)]
    fn row(
        part: &str,
        vendor: &str,
        kind: &str,
        site: &str,
        store: f64,
        iqc: f64,
        past_due: f64,
        w01: f64,
        buyer: &str,
    ) -> Vec<Cell> {
        vec![
            Cell::from(part),
            Cell::from(vendor),
            Cell::from(kind),
            Cell::from(site),
            Cell::Number(store),
            Cell::Number(iqc),
            Cell::Number(past_due),
            Cell::Number(w01),
            Cell::Number(past_due + w01),
            Cell::from(buyer),
        ]
    }

    fn sheet(rows: Vec<Vec<Cell>>) -> Table {
        Table::with_rows(HEADER.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn value<'a>(table: &'a Table, row: usize, column: &str) -> &'a Cell {
        table.cell(row, column).unwrap()
    }

    #[test]
    fn test_firm_and_forecast_merge_into_one_row() {
        let input = sheet(vec![
            row("A", "V1", "Firm", "TH3-SHTP", 5.0, 2.0, 10.0, 0.0, "Ann"),
            row("A", "V1", "Forecast", "TD3-DDK", 0.0, 0.0, 0.0, 7.0, "Bob"),
        ]);
        let out = aggregate(input).unwrap();

        let expected = [
            "Part_No",
            "Vendor_Code",
            "Type",
            "Store_Qty",
            "IQC_QTY",
            "Past due",
            "W01",
            "Buyer",
        ];
        assert_eq!(out.columns(), &expected.map(String::from)[..]);
        assert_eq!(out.row_count(), 1);
        assert_eq!(
            out.rows()[0],
            vec![
                Cell::from("A"),
                Cell::from("V1"),
                Cell::from("Firm+Forecast"),
                Cell::Number(5.0),
                Cell::Number(2.0),
                Cell::Number(10.0),
                Cell::Number(7.0),
                Cell::from("Ann"),
            ]
        );
    }

    #[test]
    fn test_unknown_site_adds_demand_but_no_stock() {
        let input = sheet(vec![
            row("A", "V1", "Firm", "TH3-SHTP", 5.0, 1.0, 1.0, 0.0, ""),
            row("A", "V1", "Firm", "OTHER", 50.0, 50.0, 4.0, 0.0, ""),
        ]);
        let out = aggregate(input).unwrap();

        assert_eq!(value(&out, 0, "Past due"), &Cell::Number(5.0));
        assert_eq!(value(&out, 0, "Store_Qty"), &Cell::Number(5.0));
        assert_eq!(value(&out, 0, "IQC_QTY"), &Cell::Number(1.0));
    }

    #[test]
    fn test_td3_only_key_in_site_union() {
        let input = sheet(vec![row("B", "V2", "Firm", "TD3-DDK", 3.0, 4.0, 1.0, 0.0, "")]);
        let trimmed = {
            let mut t = input.clone();
            t.trim_columns();
            t
        };
        let layout = ColumnLayout::resolve(&trimmed).unwrap();
        let stock = site_stock(&trimmed, &layout).unwrap();

        let s = stock[&GroupKey::text("B", "V2")];
        assert_eq!(s.store_th3, 0.0);
        assert_eq!(s.iqc_th3, 0.0);
        assert_eq!(s.store_qty(), 3.0);
        assert_eq!(s.iqc_qty(), 4.0);

        let out = aggregate(input).unwrap();
        assert_eq!(value(&out, 0, "Store_Qty"), &Cell::Number(3.0));
    }

    #[test]
    fn test_forecast_stock_is_ignored() {
        let input = sheet(vec![
            row("A", "V1", "Forecast", "TH3-SHTP", 9.0, 9.0, 1.0, 0.0, ""),
            row("B", "V1", "Firm", "TH3-SHTP", 2.0, 0.0, 1.0, 0.0, ""),
        ]);
        let out = aggregate(input).unwrap();

        // A has no Firm stock row at all: left join leaves it empty
        assert_eq!(value(&out, 0, "Part_No"), &Cell::from("A"));
        assert_eq!(value(&out, 0, "Store_Qty"), &Cell::Empty);
        assert_eq!(value(&out, 1, "Store_Qty"), &Cell::Number(2.0));
    }

    #[test]
    fn test_other_types_are_excluded() {
        let input = sheet(vec![
            row("A", "V1", "Firm", "TH3-SHTP", 0.0, 0.0, 1.0, 1.0, ""),
            row("A", "V1", "Plan", "TH3-SHTP", 0.0, 0.0, 100.0, 100.0, ""),
            row("C", "V1", "firm", "TH3-SHTP", 0.0, 0.0, 100.0, 100.0, ""),
        ]);
        let out = aggregate(input).unwrap();

        assert_eq!(out.row_count(), 1);
        assert_eq!(value(&out, 0, "Past due"), &Cell::Number(1.0));
        assert_eq!(value(&out, 0, "W01"), &Cell::Number(1.0));
    }

    #[test]
    fn test_no_firm_or_forecast_is_empty_input() {
        let input = sheet(vec![row("A", "V1", "Plan", "TH3-SHTP", 1.0, 1.0, 1.0, 1.0, "")]);
        assert_eq!(aggregate(input).unwrap_err(), AggregateError::EmptyInput);

        let empty = sheet(vec![]);
        assert_eq!(aggregate(empty).unwrap_err(), AggregateError::EmptyInput);
    }

    #[test]
    fn test_missing_required_column() {
        for missing in ["Past due", "Total_Demand", "Type", "Part_No", "Vendor_Code"] {
            let columns: Vec<String> = HEADER
                .iter()
                .filter(|c| **c != missing)
                .map(|c| c.to_string())
                .collect();
            let err = aggregate(Table::new(columns)).unwrap_err();
            assert_eq!(err, AggregateError::MissingColumn(missing.to_string()));
        }
    }

    #[test]
    fn test_padded_headers_are_trimmed() {
        let columns = HEADER.iter().map(|c| format!("  {} ", c)).collect();
        let input = Table::with_rows(
            columns,
            vec![row("A", "V1", "Firm", "TH3-SHTP", 1.0, 0.0, 2.0, 3.0, "Ann")],
        );
        let out = aggregate(input).unwrap();

        assert_eq!(value(&out, 0, "W01"), &Cell::Number(3.0));
        assert_eq!(value(&out, 0, "Buyer"), &Cell::from("Ann"));
    }

    #[test]
    fn test_inverted_range() {
        let columns = ["Part_No", "Vendor_Code", "Type", "Total_Demand", "Past due"]
            .map(String::from)
            .to_vec();
        let err = aggregate(Table::new(columns)).unwrap_err();
        assert!(matches!(err, AggregateError::InvertedRange { .. }));
    }

    #[test]
    fn test_output_never_has_dropped_columns_and_keys_unique() {
        let input = sheet(vec![
            row("A", "V1", "Firm", "TH3-SHTP", 1.0, 0.0, 1.0, 0.0, ""),
            row("A", "V2", "Firm", "TD3-DDK", 1.0, 0.0, 1.0, 0.0, ""),
            row("A", "V1", "Forecast", "TD3-DDK", 1.0, 0.0, 1.0, 0.0, ""),
            row("B", "V1", "Forecast", "X", 1.0, 0.0, 1.0, 0.0, ""),
        ]);
        let out = aggregate(input).unwrap();

        assert!(!out.has_column("Total_Demand"));
        assert!(!out.has_column("Site"));

        let mut keys: Vec<(String, String)> = out
            .rows()
            .iter()
            .map(|r| (r[0].to_string(), r[1].to_string()))
            .collect();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
        assert_eq!(before, 3);
    }

    #[test]
    fn test_row_order_does_not_matter() {
        let rows = vec![
            row("B", "V1", "Firm", "TH3-SHTP", 1.0, 2.0, 3.0, 4.0, "x"),
            row("C", "V1", "Firm", "TH3-SHTP", 0.1, 0.3, 0.1, 0.2, "z"),
            row("A", "V1", "Forecast", "TD3-DDK", 5.0, 6.0, 7.0, 8.0, "y"),
            row("C", "V1", "Firm", "TH3-SHTP", 0.2, 0.2, 0.2, 0.3, "z"),
            row("A", "V1", "Firm", "TD3-DDK", 9.0, 1.0, 2.0, 3.0, "y"),
            row("C", "V1", "Forecast", "TD3-DDK", 0.3, 0.1, 0.3, 0.1, "z"),
            row("B", "V1", "Forecast", "TH3-SHTP", 4.0, 5.0, 6.0, 7.0, "x"),
            row("C", "V1", "Firm", "TD3-DDK", 0.7, 0.05, 0.15, 0.35, "z"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let a = aggregate(sheet(rows)).unwrap();
        let b = aggregate(sheet(reversed)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_idempotent() {
        let input = sheet(vec![
            row("A", "V1", "Firm", "TH3-SHTP", 1.0, 2.0, 3.0, 4.0, "x"),
            row("A", "V1", "Forecast", "TD3-DDK", 5.0, 6.0, 7.0, 8.0, "y"),
        ]);
        assert_eq!(aggregate(input.clone()).unwrap(), aggregate(input).unwrap());
    }

    #[test]
    fn test_first_metadata_wins() {
        let input = sheet(vec![
            row("A", "V1", "Plan", "TH3-SHTP", 0.0, 0.0, 0.0, 0.0, "First"),
            row("A", "V1", "Firm", "TH3-SHTP", 0.0, 0.0, 1.0, 0.0, "Second"),
        ]);
        let out = aggregate(input).unwrap();
        assert_eq!(value(&out, 0, "Buyer"), &Cell::from("First"));
    }

    #[test]
    fn test_without_site_columns() {
        let columns = ["Part_No", "Vendor_Code", "Type", "Past due", "Total_Demand", "Org"]
            .map(String::from)
            .to_vec();
        let input = Table::with_rows(
            columns,
            vec![vec![
                Cell::from("A"),
                Cell::from("V"),
                Cell::from("Firm"),
                Cell::Number(2.0),
                Cell::Number(2.0),
                Cell::from("O1"),
            ]],
        );
        let out = aggregate(input).unwrap();

        let expected = [
            "Part_No",
            "Vendor_Code",
            "Type",
            "Store_Qty",
            "IQC_QTY",
            "Past due",
            "Org",
        ];
        assert_eq!(out.columns(), &expected.map(String::from)[..]);
        assert_eq!(value(&out, 0, "Store_Qty"), &Cell::Empty);
    }

    #[test]
    fn test_reserved_columns_inside_range_are_not_summed() {
        let columns = ["Part_No", "Vendor_Code", "Past due", "Type", "Store_Qty", "Total_Demand"]
            .map(String::from)
            .to_vec();
        let layout = ColumnLayout::resolve(&Table::new(columns)).unwrap();
        let names: Vec<&str> = layout.demand_names().collect();
        assert_eq!(names, vec!["Past due", "Total_Demand"]);
    }

    #[test]
    fn test_not_available_cells_count_as_missing() {
        use crate::parser::to_cell;
        use calamine::{CellErrorType, Data};

        let na = to_cell(&Data::Error(CellErrorType::NA));
        let mut firm = row("A", "V1", "Firm", "TH3-SHTP", 5.0, 2.0, 10.0, 0.0, "Ann");
        firm[7] = na;
        firm[5] = to_cell(&Data::String("#N/A".into()));
        let mut orphan = row("", "V1", "Firm", "TH3-SHTP", 1.0, 1.0, 99.0, 99.0, "");
        orphan[0] = to_cell(&Data::String("NA".into()));

        let out = aggregate(sheet(vec![firm, orphan])).unwrap();

        // The unkeyed row joins no group; #N/A sums as 0.
        assert_eq!(out.row_count(), 1);
        assert_eq!(value(&out, 0, "W01"), &Cell::Number(0.0));
        assert_eq!(value(&out, 0, "Past due"), &Cell::Number(10.0));
        assert_eq!(value(&out, 0, "IQC_QTY"), &Cell::Number(0.0));
    }

    #[test]
    fn test_invalid_number_in_demand() {
        let mut bad = row("A", "V1", "Firm", "TH3-SHTP", 0.0, 0.0, 0.0, 0.0, "");
        bad[7] = Cell::from("soon");
        let err = aggregate(sheet(vec![bad])).unwrap_err();
        assert_eq!(
            err,
            AggregateError::InvalidNumber {
                row: 2,
                column: "W01".into(),
                value: "soon".into(),
            }
        );
    }
}
