use std::time::Duration;

use tracing::info;

use crate::config::MergeSpec;
use crate::error::Result;
use crate::execution::gateway::{run_statement, ExecutionRequest, QueryExecutor, DEFAULT_POLL_INTERVAL};
use crate::generator::merge_generator::{compile_merge, CompiledStatement};
use crate::schema::catalog::CatalogProvider;
use crate::schema::resolver::{resolve, resolve_columns};

/// A successful merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Engine execution id.
    pub execution_id: String,
    /// The statement that was submitted.
    pub statement: CompiledStatement,
}

/// Resolves schemas, compiles, and submits one merge per run.
pub struct MergeRunner<'a, C: ?Sized, E: ?Sized> {
    catalog: &'a C,
    executor: &'a E,
    poll_interval: Duration,
    output_location: Option<String>,
    workgroup: Option<String>,
}

impl<'a, C, E> MergeRunner<'a, C, E>
where
    C: CatalogProvider + ?Sized,
    E: QueryExecutor + ?Sized,
{
    /// Runner over a catalog and an executor.
    pub fn new(catalog: &'a C, executor: &'a E) -> Self {
        Self {
            catalog,
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            output_location: None,
            workgroup: None,
        }
    }

    /// Status poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Result output location passed with every submission.
    pub fn with_output_location(mut self, location: &str) -> Self {
        self.output_location = Some(location.to_string());
        self
    }

    /// Workgroup passed with every submission.
    pub fn with_workgroup(mut self, workgroup: &str) -> Self {
        self.workgroup = Some(workgroup.to_string());
        self
    }

    /// Resolve both relations fresh and compile the statement without submitting.
    pub fn compile(&self, spec: &MergeSpec) -> Result<CompiledStatement> {
        spec.validate()?;
        let schema = resolve(self.catalog, &spec.destination)?;
        let source_columns = resolve_columns(self.catalog, &spec.source)?;
        compile_merge(spec, &schema, &source_columns)
    }

    /// Compile, submit once, and wait for a terminal state.
    pub fn run(&self, spec: &MergeSpec) -> Result<MergeOutcome> {
        let statement = self.compile(spec)?;
        let request = ExecutionRequest {
            statement: statement.sql().to_string(),
            database: spec.destination.database().to_string(),
            output_location: self.output_location.clone(),
            workgroup: self.workgroup.clone(),
        };
        let execution_id = run_statement(self.executor, &request, self.poll_interval)?;
        info!(
            destination = %spec.destination,
            execution_id = %execution_id,
            "merge finished"
        );
        Ok(MergeOutcome {
            execution_id,
            statement,
        })
    }
}
