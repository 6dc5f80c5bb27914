use std::io::{self, Write};
use std::time::Duration;

use tunestream::catalog::display_from_fields;
use tunestream::config::TrackDisplayField;
use tunestream::player::{Callback, CallbackData};

pub fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// One-line "now playing" text: elapsed time, total when known, track name.
pub fn status_line(data: &CallbackData, fields: &[TrackDisplayField], sep: &str) -> String {
    let name = display_from_fields(&data.track, fields, sep);
    let elapsed = format_mmss(data.duration);
    if data.track.duration.is_zero() {
        format!("{elapsed} {name}")
    } else {
        format!("{elapsed}/{} {name}", format_mmss(data.track.duration))
    }
}

/// Callback that keeps redrawing the status line in place on stdout.
pub fn printer(fields: Vec<TrackDisplayField>, sep: String) -> Callback {
    Box::new(move |data| {
        let mut out = io::stdout().lock();
        // Carriage return plus clear-to-end-of-line redraws in place.
        let _ = write!(out, "\r{}\x1b[K", status_line(data, &fields, &sep));
        let _ = out.flush();
    })
}
