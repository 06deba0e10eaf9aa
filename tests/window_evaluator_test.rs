use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::compute::SortOptions;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::physical_expr::expressions::{col, lit};
use datafusion::physical_expr::{PhysicalExpr, PhysicalSortExpr};

use volga_window::{
    FrameBound, FrameSpec, WindowEngineConfig, WindowError, WindowEvaluator, WindowFunctionCall,
    WindowPlan,
};

fn input(groups: Vec<&str>, keys: Vec<Option<i64>>, values: Vec<Option<i64>>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("g", DataType::Utf8, false),
        Field::new("k", DataType::Int64, true),
        Field::new("v", DataType::Int64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(groups)),
            Arc::new(Int64Array::from(keys)),
            Arc::new(Int64Array::from(values)),
        ],
    )
    .unwrap()
}

fn column(batch: &RecordBatch, name: &str) -> Arc<dyn PhysicalExpr> {
    col(name, &batch.schema()).unwrap()
}

fn order_by_k(batch: &RecordBatch) -> Vec<PhysicalSortExpr> {
    vec![PhysicalSortExpr::new(column(batch, "k"), SortOptions::default())]
}

fn call(name: &str, args: Vec<Arc<dyn PhysicalExpr>>, alias: &str) -> WindowFunctionCall {
    WindowFunctionCall::try_new(name, args, None, alias).unwrap()
}

fn ints(batch: &RecordBatch, name: &str) -> Vec<Option<i64>> {
    let array = batch.column_by_name(name).unwrap();
    let array = array.as_any().downcast_ref::<Int64Array>().unwrap();
    array.iter().collect()
}

fn floats(batch: &RecordBatch, name: &str) -> Vec<f64> {
    let array = batch.column_by_name(name).unwrap();
    let array = array.as_any().downcast_ref::<Float64Array>().unwrap();
    array.values().to_vec()
}

fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
    let array = batch.column_by_name(name).unwrap();
    let array = array.as_any().downcast_ref::<StringArray>().unwrap();
    array.iter().map(|s| s.unwrap().to_string()).collect()
}

fn assert_f64s(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!((a - e).abs() < 1e-9, "mismatch at {i}: got={a} expected={e}");
    }
}

fn some(values: &[i64]) -> Vec<Option<i64>> {
    values.iter().copied().map(Some).collect()
}

#[test]
fn test_ranking_with_ties() {
    let batch = input(
        vec!["a"; 5],
        some(&[20, 10, 30, 20, 10]),
        some(&[1, 2, 3, 4, 5]),
    );
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![
            call("row_number", vec![], "rn"),
            call("rank", vec![], "rank"),
            call("dense_rank", vec![], "dense_rank"),
            call("percent_rank", vec![], "percent_rank"),
            call("cume_dist", vec![], "cume_dist"),
        ],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();

    assert_eq!(ints(&out, "k"), some(&[10, 10, 20, 20, 30]));
    // stable sort keeps input order among equal keys
    assert_eq!(ints(&out, "v"), some(&[2, 5, 1, 4, 3]));
    assert_eq!(ints(&out, "rn"), some(&[1, 2, 3, 4, 5]));
    assert_eq!(ints(&out, "rank"), some(&[1, 1, 3, 3, 5]));
    assert_eq!(ints(&out, "dense_rank"), some(&[1, 1, 2, 2, 3]));
    assert_f64s(&floats(&out, "percent_rank"), &[0.0, 0.0, 0.5, 0.5, 1.0]);
    assert_f64s(&floats(&out, "cume_dist"), &[0.4, 0.4, 0.8, 0.8, 1.0]);
}

#[test]
fn test_partitions_reset_state() {
    let batch = input(
        vec!["b", "a", "b", "a", "b"],
        some(&[3, 2, 1, 1, 2]),
        some(&[30, 20, 10, 11, 21]),
    );
    let plan = WindowPlan::new(
        vec![column(&batch, "g")],
        order_by_k(&batch),
        vec![
            call("row_number", vec![], "rn"),
            call("lag", vec![column(&batch, "v")], "prev"),
            call("first_value", vec![column(&batch, "v")], "first"),
        ],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();

    assert_eq!(strings(&out, "g"), vec!["a", "a", "b", "b", "b"]);
    assert_eq!(ints(&out, "rn"), some(&[1, 2, 1, 2, 3]));
    assert_eq!(ints(&out, "prev"), vec![None, Some(11), None, Some(10), Some(21)]);
    assert_eq!(ints(&out, "first"), some(&[11, 11, 10, 10, 10]));
}

#[test]
fn test_lead_lag_with_defaults() {
    let batch = input(vec!["a"; 4], some(&[1, 2, 3, 4]), some(&[10, 20, 30, 40]));
    let v = column(&batch, "v");
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![
            call("lead", vec![v.clone()], "lead"),
            call("lag", vec![v.clone(), lit(2i64)], "lag2"),
            call("lead", vec![v.clone(), lit(1i64), lit(0i64)], "lead_default"),
            call("lag", vec![v, lit(1i64), lit(-1i64)], "lag_default"),
        ],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();

    assert_eq!(ints(&out, "lead"), vec![Some(20), Some(30), Some(40), None]);
    assert_eq!(ints(&out, "lag2"), vec![None, None, Some(10), Some(20)]);
    assert_eq!(ints(&out, "lead_default"), some(&[20, 30, 40, 0]));
    assert_eq!(ints(&out, "lag_default"), some(&[-1, 10, 20, 30]));
}

#[test]
fn test_ntile() {
    let n = 10;
    let batch = input(vec!["a"; n], some(&(0..n as i64).collect::<Vec<_>>()), vec![None; n]);
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![call("ntile", vec![lit(3i64)], "bucket")],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(ints(&out, "bucket"), some(&[1, 1, 1, 1, 2, 2, 2, 3, 3, 3]));
}

#[test]
fn test_frame_values() {
    let batch = input(vec!["a"; 6], some(&[1, 2, 3, 4, 5, 6]), some(&[1, 2, 3, 4, 5, 6]));
    let v = column(&batch, "v");
    let frame = Some(FrameSpec::rows(FrameBound::Preceding(2), FrameBound::Following(1)).unwrap());
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![
            WindowFunctionCall::try_new("first_value", vec![v.clone()], frame, "first").unwrap(),
            WindowFunctionCall::try_new("last_value", vec![v.clone()], frame, "last").unwrap(),
            WindowFunctionCall::try_new("nth_value", vec![v.clone(), lit(2i64)], frame, "second")
                .unwrap(),
            call("last_value", vec![v], "running_last"),
        ],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();

    assert_eq!(ints(&out, "first"), some(&[1, 1, 1, 2, 3, 4]));
    assert_eq!(ints(&out, "last"), some(&[2, 3, 4, 5, 6, 6]));
    assert_eq!(ints(&out, "second"), some(&[2, 2, 2, 3, 4, 5]));
    // default frame ends at the current row's last peer
    assert_eq!(ints(&out, "running_last"), some(&[1, 2, 3, 4, 5, 6]));
}

#[test]
fn test_default_frame_includes_peers() {
    let batch = input(vec!["a"; 4], some(&[1, 1, 2, 2]), some(&[5, 6, 7, 8]));
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![call("last_value", vec![column(&batch, "v")], "last")],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(ints(&out, "last"), some(&[6, 6, 8, 8]));
}

#[test]
fn test_descending_order_with_nulls() {
    let batch = input(
        vec!["a"; 4],
        vec![Some(1), None, Some(3), Some(2)],
        some(&[1, 2, 3, 4]),
    );
    let options = SortOptions {
        descending: true,
        nulls_first: false,
    };
    let plan = WindowPlan::new(
        vec![],
        vec![PhysicalSortExpr::new(column(&batch, "k"), options)],
        vec![call("row_number", vec![], "rn")],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(ints(&out, "k"), vec![Some(3), Some(2), Some(1), None]);
    assert_eq!(ints(&out, "v"), some(&[3, 4, 1, 2]));
}

#[test]
fn test_presorted_input_is_not_reordered() {
    let batch = input(
        vec!["a", "a", "b", "b"],
        some(&[2, 1, 4, 3]),
        some(&[1, 2, 3, 4]),
    );
    let config = WindowEngineConfig {
        sort_input: false,
        ..Default::default()
    };
    let plan = WindowPlan::new(
        vec![column(&batch, "g")],
        order_by_k(&batch),
        vec![call("row_number", vec![], "rn")],
    );
    let out = WindowEvaluator::new(plan, config).evaluate(&batch).unwrap();
    assert_eq!(ints(&out, "k"), some(&[2, 1, 4, 3]));
    assert_eq!(ints(&out, "rn"), some(&[1, 2, 1, 2]));
}

#[test]
fn test_max_partition_rows() {
    let batch = input(vec!["a", "a", "a", "b"], some(&[1, 2, 3, 4]), some(&[1, 2, 3, 4]));
    let plan = WindowPlan::new(
        vec![column(&batch, "g")],
        order_by_k(&batch),
        vec![call("row_number", vec![], "rn")],
    );
    let config = WindowEngineConfig {
        max_partition_rows: Some(2),
        ..Default::default()
    };
    let err = WindowEvaluator::new(plan.clone(), config)
        .evaluate(&batch)
        .unwrap_err();
    assert!(matches!(err, WindowError::ResourcesExhausted(_)), "{err}");

    let config = WindowEngineConfig {
        max_partition_rows: Some(3),
        ..Default::default()
    };
    assert!(WindowEvaluator::new(plan, config).evaluate(&batch).is_ok());
}

#[test]
fn test_ntile_error_propagates() {
    let batch = input(vec!["a"; 2], some(&[1, 2]), some(&[1, 2]));
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![call("ntile", vec![lit(0i64)], "bucket")],
    );
    let err = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap_err();
    assert!(matches!(err, WindowError::InvalidArgument(_)), "{err}");
}

#[test]
fn test_release_marked_rows_does_not_change_results() {
    let batch = input(
        vec!["a"; 6],
        some(&[1, 1, 2, 3, 3, 4]),
        vec![Some(4), None, Some(9), Some(1), Some(7), Some(2)],
    );
    let v = column(&batch, "v");
    let sliding = FrameSpec::rows(FrameBound::Preceding(1), FrameBound::CurrentRow).unwrap();
    let calls = vec![
        call("rank", vec![], "rank"),
        call("lag", vec![v.clone(), lit(2i64)], "lag2"),
        WindowFunctionCall::try_new("first_value", vec![v], Some(sliding), "first").unwrap(),
    ];
    let plan = WindowPlan::new(vec![], order_by_k(&batch), calls);

    let released = WindowEvaluator::new(plan.clone(), WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    let retained = WindowEvaluator::new(
        plan,
        WindowEngineConfig {
            release_marked_rows: false,
            ..Default::default()
        },
    )
    .evaluate(&batch)
    .unwrap();
    assert_eq!(released, retained);
    assert_eq!(ints(&released, "rank"), some(&[1, 1, 3, 4, 4, 6]));
    assert_eq!(ints(&released, "lag2"), vec![None, None, Some(4), None, Some(9), Some(1)]);
    assert_eq!(
        ints(&released, "first"),
        vec![Some(4), Some(4), None, Some(9), Some(1), Some(7)]
    );
}

#[test]
fn test_unknown_function() {
    let err = WindowFunctionCall::try_new("median", vec![], None, "m").unwrap_err();
    assert!(matches!(err, WindowError::InvalidArgument(_)), "{err}");
}

#[test]
fn test_partition_max() {
    let batch = input(
        vec!["a", "b", "a", "b"],
        some(&[1, 2, 3, 4]),
        vec![Some(5), None, Some(9), Some(-3)],
    );
    let plan = WindowPlan::new(
        vec![column(&batch, "g")],
        vec![],
        vec![call("partition_max", vec![column(&batch, "v")], "max")],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(strings(&out, "g"), vec!["a", "a", "b", "b"]);
    assert_eq!(ints(&out, "max"), some(&[9, 9, -3, -3]));
}

#[test]
fn test_partition_max_ignores_default_frame() {
    let batch = input(
        vec!["a", "a", "a", "a", "b", "b"],
        some(&[1, 2, 3, 4, 1, 2]),
        vec![Some(1), Some(5), Some(8), Some(2), None, Some(-1)],
    );
    let plan = WindowPlan::new(
        vec![column(&batch, "g")],
        order_by_k(&batch),
        vec![call("partition_max", vec![column(&batch, "v")], "max")],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(ints(&out, "max"), some(&[8, 8, 8, 8, -1, -1]));
}

#[test]
fn test_extreme_offsets_give_null() {
    let batch = input(vec!["a"; 3], some(&[1, 2, 3]), some(&[10, 20, 30]));
    let v = column(&batch, "v");
    let plan = WindowPlan::new(
        vec![],
        order_by_k(&batch),
        vec![
            call("lead", vec![v.clone(), lit(i64::MAX)], "lead"),
            call("lag", vec![v.clone(), lit(i64::MIN), lit(7i64)], "lag"),
            call("nth_value", vec![v, lit(i64::MAX)], "nth"),
        ],
    );
    let out = WindowEvaluator::new(plan, WindowEngineConfig::default())
        .evaluate(&batch)
        .unwrap();
    assert_eq!(ints(&out, "lead"), vec![None, None, None]);
    assert_eq!(ints(&out, "lag"), some(&[7, 7, 7]));
    assert_eq!(ints(&out, "nth"), vec![None, None, None]);
}
