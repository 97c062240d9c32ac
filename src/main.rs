//! lifegrid - Demo Host
//!
//! Drives one grid session the way a UI host would: mount, scroll, keyboard
//! navigation, resize, unmount.
//!
//! Usage: `lifegrid [DATE_OF_BIRTH] [LIFESPAN_YEARS]`

use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::LocalTime};
use tracing_subscriber::prelude::*;

use lifegrid::domain::scroll::{ScrollEvent, ScrollKey};
use lifegrid::domain::week::LifeSpan;
use lifegrid::services::{FileStorage, GridSession, LifeWeeksLoader};
use lifegrid::utils::config_store::{load_settings, settings_path};

const DEFAULT_DATE_OF_BIRTH: &str = "1990-06-15";
const DEFAULT_LIFESPAN_YEARS: u32 = 80;

/// Console logging plus an optional daily file under `$LIFEGRID_LOG_DIR`
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let console = fmt::layer().with_timer(LocalTime::rfc_3339());

    let (file, guard) = match std::env::var_os("LIFEGRID_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lifegrid.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<(NaiveDate, u32)> {
    let dob = args
        .next()
        .unwrap_or_else(|| DEFAULT_DATE_OF_BIRTH.to_string());
    let dob = NaiveDate::parse_from_str(&dob, "%Y-%m-%d")
        .with_context(|| format!("date of birth must be YYYY-MM-DD, got {dob:?}"))?;
    let years = match args.next() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("lifespan must be a whole number of years, got {raw:?}"))?,
        None => DEFAULT_LIFESPAN_YEARS,
    };
    Ok((dob, years))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    tracing::info!("Starting lifegrid demo host...");

    let path = settings_path()?;
    let settings =
        load_settings(&path).with_context(|| format!("loading {}", path.display()))?;

    let today = chrono::Local::now().date_naive();
    let (dob, years) = parse_args(std::env::args().skip(1))?;
    let span = LifeSpan::new(dob, years, today)?;
    let loader = LifeWeeksLoader::new(span, today);
    let total_items = loader.total_items();

    let user = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let key = ScrollKey::new(&user, &format!("weeks-{years}y"));
    let storage = FileStorage::open_default()?;
    let mut session = GridSession::new(&settings, loader, storage, key, total_items)?;

    let state = session.mount(1200.0, 600.0)?;
    tracing::info!(
        total_items,
        scroll_top = state.scroll_top,
        start_row = state.start_row,
        end_row = state.end_row,
        "mounted"
    );
    session.load_visible().await;

    // A fling: three events land in one frame, only the last is applied
    for (seq, top) in [120.0, 480.0, 960.0].into_iter().enumerate() {
        session.on_scroll(ScrollEvent::new(top, 0.0, seq as u64 + 1));
    }
    let state = session.frame();
    tracing::info!(
        scroll_top = state.scroll_top,
        visible = state.len(),
        offset_y = state.offset_y,
        "scrolled"
    );
    session.load_visible().await;

    let progress = span.progress(today);
    tracing::info!(
        weeks_lived = progress.weeks_lived,
        weeks_remaining = progress.weeks_remaining,
        progress = progress.progress_percentage,
        age_years = progress.current_age.years,
        "life progress"
    );

    // Keyboard "go to this week"
    let current = progress.current_week_index;
    session.ensure_item_visible(current);
    session.load_visible().await;
    match session.get(current).as_ref().and_then(|entry| entry.data()) {
        Some(week) => tracing::info!(
            index = week.index,
            start = %week.start,
            kind = ?week.kind,
            age_years = week.age.years,
            age_months = week.age.months,
            current = week.is_current(),
            "current week"
        ),
        None => tracing::warn!(index = current, "current week not loaded"),
    }

    // Rotate to a narrow viewport and let the resize settle
    let now = Instant::now();
    session.on_resize(420.0, 800.0, now)?;
    if let Some(layout) = session.poll_layout(now + settings.resize_debounce())? {
        tracing::info!(
            columns = layout.columns,
            cell_size = layout.cell_size,
            scroll_top = session.state().scroll_top,
            "layout changed"
        );
        session.load_visible().await;
    }

    let metrics = session.metrics();
    tracing::info!(
        hits = metrics.hits,
        misses = metrics.misses,
        evictions = metrics.evictions,
        hit_ratio = metrics.hit_ratio(),
        cached = session.cache().len(),
        "cache metrics"
    );

    session.unmount();
    Ok(())
}
