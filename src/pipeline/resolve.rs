//! Card resolution: [`RawEntry`] → [`ResolvedCard`] via the catalog.
//!
//! Every entry is looked up concurrently. Any failure is fatal to the job:
//! a decklist with an unknown printing produces no document at all.

use crate::catalog::Catalog;
use crate::error::GrimoireError;
use crate::job::JobId;
use crate::output::{Face, ResolvedCard};
use crate::pipeline::decklist::RawEntry;
use crate::pipeline::limiter::RateLimiter;
use crate::pipeline::retry::{RetryExhausted, RetryPolicy};
use crate::pipeline::{fan_out, Pipeline};
use tracing::{debug, warn};

/// Resolve one entry, retrying per `policy`.
pub async fn resolve_entry(
    catalog: &dyn Catalog,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    entry: &RawEntry,
) -> Result<ResolvedCard, GrimoireError> {
    let label = format!("lookup {}/{}", entry.set_code, entry.collector_number);
    let metadata = policy
        .run(limiter, &label, || {
            catalog.card(&entry.set_code, &entry.collector_number)
        })
        .await
        .map_err(|exhausted| lookup_error(entry, exhausted))?;

    let faces: &[Face] = if metadata.is_double_faced() {
        &[Face::Front, Face::Back]
    } else {
        &[Face::Front]
    };
    if entry.is_multi_face != metadata.is_double_faced() {
        debug!(
            "'{}' ({}): decklist name and catalog layout '{}' disagree on faces",
            entry.name, entry.set_code, metadata.layout
        );
    }

    Ok(ResolvedCard {
        quantity: entry.quantity,
        name: entry.name.clone(),
        set_code: entry.set_code.clone(),
        collector_number: entry.collector_number.clone(),
        faces: faces
            .iter()
            .map(|&face| {
                let url = catalog.image_url(&entry.set_code, &entry.collector_number, face);
                (face, url)
            })
            .collect(),
    })
}

/// Resolve every entry, preserving decklist order.
pub(crate) async fn resolve_all(
    pipeline: &Pipeline,
    job: JobId,
    entries: &[RawEntry],
) -> Result<Vec<ResolvedCard>, GrimoireError> {
    let total = entries.len();
    let outcomes = fan_out(entries, |index, entry| async move {
        let outcome = resolve_entry(
            pipeline.catalog.as_ref(),
            &pipeline.limiter,
            &pipeline.config.lookup_retry,
            entry,
        )
        .await;
        if let (Ok(card), Some(cb)) = (&outcome, &pipeline.config.progress_callback) {
            cb.on_card_resolved(job, index, total, &card.name);
        }
        outcome
    })
    .await;

    collect_resolved(outcomes)
}

/// All cards, or the job-level failure: the lone error itself, or an
/// aggregate naming the first failure in decklist order.
fn collect_resolved(
    outcomes: Vec<Result<ResolvedCard, GrimoireError>>,
) -> Result<Vec<ResolvedCard>, GrimoireError> {
    let total = outcomes.len();
    let mut cards = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(card) => cards.push(card),
            Err(e) => errors.push(e),
        }
    }

    let failed = errors.len();
    let mut errors = errors.into_iter();
    match (errors.next(), failed) {
        (None, _) => Ok(cards),
        (Some(only), 1) => Err(only),
        (Some(first), _) => {
            warn!("{}/{} cards failed to resolve", failed, total);
            Err(GrimoireError::Resolution {
                failed,
                total,
                first: Box::new(first),
            })
        }
    }
}

fn lookup_error(entry: &RawEntry, exhausted: RetryExhausted) -> GrimoireError {
    if exhausted.last.is_throttled() {
        GrimoireError::Throttled {
            set_code: entry.set_code.clone(),
            collector_number: entry.collector_number.clone(),
            attempts: exhausted.attempts,
        }
    } else {
        GrimoireError::Lookup {
            set_code: entry.set_code.clone(),
            collector_number: entry.collector_number.clone(),
            attempts: exhausted.attempts,
            detail: exhausted.last.to_string(),
        }
    }
}
