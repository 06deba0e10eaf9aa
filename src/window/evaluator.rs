use std::sync::Arc;

use arrow::array::{new_empty_array, ArrayRef};
use arrow::compute::SortOptions;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion::physical_expr::{PhysicalExpr, PhysicalSortExpr};
use datafusion::scalar::ScalarValue;
use itertools::Itertools;
use tracing::debug;

use crate::common::error::{Result, WindowError};
use crate::common::scalar::typed_null;
use crate::config::WindowEngineConfig;
use crate::window::context::WindowContext;
use crate::window::frame::FrameSpec;
use crate::window::functions::{create_window_function, WindowFunction};
use crate::window::partitioning::{lexsort_indices, partition_ranges, take_all};
use crate::window::row_source::{PartitionedBatch, RowSource};

/// One window function invocation of a plan, producing the column `alias`.
#[derive(Debug, Clone)]
pub struct WindowFunctionCall {
    pub function: Arc<dyn WindowFunction>,
    pub args: Vec<Arc<dyn PhysicalExpr>>,
    /// `None` uses the SQL default frame for the plan's ORDER BY.
    pub frame: Option<FrameSpec>,
    pub alias: String,
}

impl WindowFunctionCall {
    pub fn new(
        function: Arc<dyn WindowFunction>,
        args: Vec<Arc<dyn PhysicalExpr>>,
        frame: Option<FrameSpec>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            function,
            args,
            frame,
            alias: alias.into(),
        }
    }

    /// Looks `name` up in the window function registry.
    pub fn try_new(
        name: &str,
        args: Vec<Arc<dyn PhysicalExpr>>,
        frame: Option<FrameSpec>,
        alias: impl Into<String>,
    ) -> Result<Self> {
        let function = create_window_function(name, &args)?;
        Ok(Self::new(function, args, frame, alias))
    }
}

/// Window functions sharing one PARTITION BY / ORDER BY clause.
#[derive(Debug, Clone, Default)]
pub struct WindowPlan {
    pub partition_by: Vec<Arc<dyn PhysicalExpr>>,
    pub order_by: Vec<PhysicalSortExpr>,
    pub calls: Vec<WindowFunctionCall>,
}

impl WindowPlan {
    pub fn new(
        partition_by: Vec<Arc<dyn PhysicalExpr>>,
        order_by: Vec<PhysicalSortExpr>,
        calls: Vec<WindowFunctionCall>,
    ) -> Self {
        Self {
            partition_by,
            order_by,
            calls,
        }
    }
}

/// Evaluates a [`WindowPlan`] over materialized record batches.
///
/// Each call gets its own [`WindowContext`] over a shared [`PartitionedBatch`];
/// rows are visited partition by partition in ascending order.
#[derive(Debug, Clone)]
pub struct WindowEvaluator {
    plan: WindowPlan,
    config: WindowEngineConfig,
}

impl WindowEvaluator {
    pub fn new(plan: WindowPlan, config: WindowEngineConfig) -> Self {
        Self { plan, config }
    }

    pub fn plan(&self) -> &WindowPlan {
        &self.plan
    }

    pub fn config(&self) -> &WindowEngineConfig {
        &self.config
    }

    fn return_types(&self, input: &Schema) -> Result<Vec<DataType>> {
        self.plan
            .calls
            .iter()
            .map(|call| {
                let arg_types = call
                    .args
                    .iter()
                    .map(|arg| arg.data_type(input))
                    .collect::<datafusion::common::Result<Vec<_>>>()?;
                call.function.return_type(&arg_types)
            })
            .collect()
    }

    /// Input schema followed by one nullable column per call.
    pub fn output_schema(&self, input: &Schema) -> Result<SchemaRef> {
        let return_types = self.return_types(input)?;
        let fields = input
            .fields()
            .iter()
            .cloned()
            .chain(
                self.plan
                    .calls
                    .iter()
                    .zip_eq(return_types)
                    .map(|(call, data_type)| Arc::new(Field::new(&call.alias, data_type, true))),
            )
            .collect::<Vec<_>>();
        Ok(Arc::new(Schema::new_with_metadata(
            fields,
            input.metadata().clone(),
        )))
    }

    /// Returns `batch` sorted by (partition keys, order keys), unless sorting
    /// is disabled, with the window function results appended.
    ///
    /// With `sort_input` disabled the batch must already be sorted: partitions
    /// are split on runs of equal partition keys.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let num_rows = batch.num_rows();
        let schema = self.output_schema(batch.schema_ref())?;
        let return_types = self.return_types(batch.schema_ref())?;
        debug!(
            num_rows,
            calls = self.plan.calls.len(),
            sort = self.config.sort_input,
            "evaluating window plan"
        );

        let mut columns = batch.columns().to_vec();
        let mut partition_keys = evaluate_all(&self.plan.partition_by, batch)?;
        let order_exprs: Vec<_> = self.plan.order_by.iter().map(|s| s.expr.clone()).collect();
        let mut order_keys = evaluate_all(&order_exprs, batch)?;
        let order_options: Vec<SortOptions> = self.plan.order_by.iter().map(|s| s.options).collect();

        let mut args = Vec::new();
        let mut arg_columns = Vec::with_capacity(self.plan.calls.len());
        for call in &self.plan.calls {
            let evaluated = evaluate_all(&call.args, batch)?;
            arg_columns.push((args.len()..args.len() + evaluated.len()).collect::<Vec<_>>());
            args.extend(evaluated);
        }

        if self.config.sort_input {
            let sort_keys = with_options(&order_keys, &order_options);
            if let Some(indices) = lexsort_indices(&partition_keys, &sort_keys)? {
                columns = take_all(&columns, &indices)?;
                partition_keys = take_all(&partition_keys, &indices)?;
                order_keys = take_all(&order_keys, &indices)?;
                args = take_all(&args, &indices)?;
            }
        }

        let partitions = partition_ranges(&partition_keys, num_rows)?;
        if let Some(limit) = self.config.max_partition_rows {
            if let Some(largest) = partitions.iter().map(|p| p.len()).max() {
                if largest > limit {
                    return Err(WindowError::ResourcesExhausted(format!(
                        "partition of {largest} rows exceeds max_partition_rows {limit}"
                    )));
                }
            }
        }
        debug!(partitions = partitions.len(), "split input into partitions");

        let source = PartitionedBatch::try_new(
            args,
            &with_options(&order_keys, &order_options),
            partitions,
        )?;
        let has_order_by = !self.plan.order_by.is_empty();
        let mut contexts: Vec<WindowContext<'_>> = self
            .plan
            .calls
            .iter()
            .zip_eq(arg_columns)
            .map(|(call, arg_columns)| {
                let frame = call
                    .frame
                    .unwrap_or_else(|| FrameSpec::default_for(has_order_by));
                WindowContext::new(&source, &source, arg_columns, frame)
            })
            .collect();
        let mut results: Vec<Vec<ScalarValue>> =
            vec![Vec::with_capacity(num_rows); self.plan.calls.len()];

        while source.advance_partition() {
            for ctx in contexts.iter_mut() {
                ctx.bind_partition()?;
            }
            let row_count = source.total_rows_in_current_partition().unwrap_or(0);
            for pos in 0..row_count {
                for (((call, ctx), output), return_type) in self
                    .plan
                    .calls
                    .iter()
                    .zip_eq(contexts.iter_mut())
                    .zip_eq(results.iter_mut())
                    .zip_eq(return_types.iter())
                {
                    ctx.set_current_position(pos)?;
                    let value = call.function.evaluate(ctx)?;
                    output.push(coerce(value, return_type)?);
                }
                if self.config.release_marked_rows {
                    if let Some(mark) = contexts.iter().map(|ctx| ctx.mark_position()).min() {
                        source.release_rows_before(mark);
                    }
                }
            }
        }

        for (values, return_type) in results.into_iter().zip_eq(return_types.iter()) {
            let array = if values.is_empty() {
                new_empty_array(return_type)
            } else {
                ScalarValue::iter_to_array(values)?
            };
            columns.push(array);
        }
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

fn evaluate_all(exprs: &[Arc<dyn PhysicalExpr>], batch: &RecordBatch) -> Result<Vec<ArrayRef>> {
    exprs
        .iter()
        .map(|expr| Ok(expr.evaluate(batch)?.into_array(batch.num_rows())?))
        .collect()
}

fn with_options(keys: &[ArrayRef], options: &[SortOptions]) -> Vec<(ArrayRef, SortOptions)> {
    keys.iter().cloned().zip_eq(options.iter().copied()).collect()
}

/// Functions may return untyped nulls or a narrower type than declared.
fn coerce(value: ScalarValue, data_type: &DataType) -> Result<ScalarValue> {
    if value.is_null() {
        return Ok(typed_null(data_type));
    }
    if &value.data_type() == data_type {
        return Ok(value);
    }
    Ok(value.cast_to(data_type)?)
}
