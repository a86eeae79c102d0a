/// Read-side aggregation over stored weather history.
///
/// Submodules:
/// - `dashboard`: summary metrics and breakdowns behind the `dashboard` command.

pub mod dashboard;
