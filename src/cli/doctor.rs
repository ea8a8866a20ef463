//! CLI `doctor` command: check the ledger database and list what needs attention.

use anyhow::{Context, Result};

use crate::config::LedgerConfig;
use crate::db::{self, HealthReport};

/// One line of the report; `problem` is `None` when the check passed.
struct Check {
    name: &'static str,
    problem: Option<String>,
    remedy: Option<&'static str>,
}

fn checks(report: &HealthReport, configured_model: &str) -> Vec<Check> {
    let mut out = Vec::new();

    out.push(Check {
        name: "integrity",
        problem: (!report.integrity_ok).then(|| report.integrity_details.clone()),
        remedy: Some("restore the file from a backup, or move it aside and run `ragledger init`"),
    });

    let fk_problem = (report.foreign_key_violations > 0).then(|| {
        report
            .foreign_key_violations_by_table
            .iter()
            .map(|(table, n)| format!("{table}: {n} row(s) with a missing parent"))
            .collect::<Vec<_>>()
            .join(", ")
    });
    out.push(Check {
        name: "foreign keys",
        problem: fk_problem,
        remedy: Some("rows were written with foreign keys disabled; purge or repair their parents"),
    });

    out.push(Check {
        name: "embeddings",
        problem: (report.orphaned_embeddings > 0)
            .then(|| format!("{} embedding(s) with no query", report.orphaned_embeddings)),
        remedy: Some("run `ragledger doctor --fix` to delete them"),
    });

    let model_problem = match report.embedding_model.as_deref() {
        Some(stored) if stored != configured_model => Some(format!(
            "stored vectors come from {stored}, config says {configured_model}"
        )),
        None => Some("no embedding model recorded".to_string()),
        Some(_) => None,
    };
    out.push(Check {
        name: "embedding model",
        problem: model_problem,
        remedy: None,
    });

    out
}

/// Run database diagnostics and print what is wrong, optionally repairing
/// what can be repaired safely.
pub fn doctor(config: &LedgerConfig, fix: bool) -> Result<()> {
    let db_path = config.resolved_db_path()?;

    if !db_path.exists() {
        println!("No ledger at {}. Run `ragledger init` to create it.", db_path.display());
        return Ok(());
    }

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let mut report = db::check_database_health(&conn).context("failed to run health check")?;

    if fix && report.orphaned_embeddings > 0 {
        let removed = db::remove_orphaned_embeddings(&conn)?;
        println!("Removed {removed} orphaned embedding(s).");
        report = db::check_database_health(&conn)?;
    }

    println!(
        "{} (schema v{}, sqlite-vec {})",
        db_path.display(),
        report.schema_version,
        report.sqlite_vec_version
    );
    println!(
        "{} queries / {} embeddings / {} retrievals / {} responses / {} feedback / {} aggregates",
        report.query_count,
        report.embedding_count,
        report.retrieval_count,
        report.response_count,
        report.feedback_count,
        report.aggregate_count
    );
    println!();

    let checks = checks(&report, &config.embedding.model);
    for check in &checks {
        match &check.problem {
            None => println!("  [ok] {}", check.name),
            Some(problem) => {
                println!("  [!!] {}: {problem}", check.name);
                if let Some(remedy) = check.remedy {
                    println!("       -> {remedy}");
                }
            }
        }
    }

    let failing = checks.iter().filter(|c| c.problem.is_some()).count();
    println!();
    if failing == 0 {
        println!("All checks passed.");
    } else {
        println!("{failing} check(s) need attention.");
    }
    Ok(())
}
