use anyhow::Result;
use chrono::NaiveDate;
use log::{info, warn};
use std::io::Write;

use crate::classifier::EmailClassifier;
use crate::config::Config;
use crate::domain::email::{ClassificationResult, Label, SummaryRecord};
use crate::mail::Mailbox;
use crate::mail::query::listing_query;

pub struct RunOptions {
    pub base_query: String,
    pub max_age_days: u32,
    pub delete_unimportant: bool,
}

impl RunOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_query: cfg.query.clone(),
            max_age_days: cfg.max_age_days(),
            delete_unimportant: cfg.delete_unimportant,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub listed: usize,
    /// Emails that produced an output record, `unknown` ones included.
    pub classified: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// One sequential pass: list, then fetch, classify, print (and maybe delete) each message.
///
/// Per-message failures are logged and never stop the loop. The only error returned is a
/// failure to write to `out`.
pub fn run(
    mailbox: &dyn Mailbox,
    classifier: &EmailClassifier,
    opts: &RunOptions,
    today: NaiveDate,
    out: &mut dyn Write,
) -> Result<RunReport> {
    let query = listing_query(&opts.base_query, opts.max_age_days, today);
    info!("listing messages matching \"{query}\"");

    let mut report = RunReport::default();
    let refs = match mailbox.list_messages(&query) {
        Ok(refs) => refs,
        Err(e) => {
            warn!("{e}");
            info!("no messages to process");
            return Ok(report);
        }
    };
    report.listed = refs.len();
    info!(
        "{} message(s) to classify with {}",
        refs.len(),
        classifier.backend_name()
    );

    for msg in &refs {
        let email = match mailbox.get_message(&msg.id) {
            Ok(email) => email,
            Err(e) => {
                warn!("skipping message {}: {e}", msg.id);
                report.skipped += 1;
                continue;
            }
        };

        let result = classifier.classify(&email).unwrap_or_else(|e| {
            warn!("could not classify message {}: {e}", email.id);
            ClassificationResult::unknown()
        });

        let record = SummaryRecord {
            classification: result.label,
            reason: result.reason.as_deref(),
            subject: &email.subject,
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
        report.classified += 1;

        if opts.delete_unimportant && result.label == Label::Unimportant {
            match mailbox.delete_message(&email.id) {
                Ok(()) => report.deleted += 1,
                Err(e) => warn!("{e}"),
            }
        }
    }

    out.flush()?;
    info!(
        "run complete: {} listed, {} classified, {} skipped, {} deleted",
        report.listed, report.classified, report.skipped, report.deleted
    );
    Ok(report)
}
