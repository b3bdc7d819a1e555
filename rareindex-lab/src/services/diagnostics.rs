//! Diagnostic yield statistics
//!
//! Yield is the share of pipelines whose status marks the case solved.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Pipeline status names that count as a diagnosis
pub const SOLVED_STATUSES: [&str; 2] = ["Solved - P/LP", "Solved - VUS"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiagnosticYield {
    pub total: i64,
    pub solved: i64,
    /// Percentage rounded to two decimals
    pub yield_percentage: f64,
}

impl DiagnosticYield {
    pub fn from_counts(total: i64, solved: i64) -> Self {
        let yield_percentage = if total == 0 {
            0.0
        } else {
            (solved as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        Self {
            total,
            solved,
            yield_percentage,
        }
    }
}

/// Yield over all pipelines, or only those of one pipeline type (by name)
pub async fn diagnostic_yield(pool: &SqlitePool, pipeline_type: Option<&str>) -> Result<DiagnosticYield> {
    let (total, solved): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN s.name IN (?, ?) THEN 1 ELSE 0 END), 0)
        FROM pipelines p
        JOIN pipeline_types pt ON pt.id = p.type_id
        LEFT JOIN statuses s ON s.id = p.status_id
        WHERE (? IS NULL OR pt.name = ?)
        "#,
    )
    .bind(SOLVED_STATUSES[0])
    .bind(SOLVED_STATUSES[1])
    .bind(pipeline_type)
    .bind(pipeline_type)
    .fetch_one(pool)
    .await?;

    Ok(DiagnosticYield::from_counts(total, solved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pipelines_is_zero_yield() {
        assert_eq!(DiagnosticYield::from_counts(0, 0).yield_percentage, 0.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(DiagnosticYield::from_counts(3, 1).yield_percentage, 33.33);
        assert_eq!(DiagnosticYield::from_counts(3, 2).yield_percentage, 66.67);
        assert_eq!(DiagnosticYield::from_counts(4, 4).yield_percentage, 100.0);
    }
}
