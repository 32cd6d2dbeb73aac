//! Terminal output for published frame results.

use crate::annotate::caption;
use crate::engine::FrameResult;
use crate::history::History;
use std::io::Write;
use std::path::PathBuf;
use tunetrap_core::Label;
use tunetrap_music::{Recommendation, Resolver, VideoSearch, YouTubeSearch};

pub fn emoji(label: &Label) -> &'static str {
    match label {
        Label::Happy => "😊",
        Label::Sad => "😢",
        Label::Angry => "😡",
        Label::Neutral => "😐",
        Label::Surprise => "😯",
        Label::Class(_) => "🙂",
    }
}

pub fn print_recommendations(
    out: &mut impl Write,
    recs: &[Recommendation],
) -> std::io::Result<()> {
    for (i, rec) in recs.iter().enumerate() {
        writeln!(out, "  {}. {} - {}", i + 1, rec.title, rec.link)?;
    }
    Ok(())
}

pub struct Renderer<W, S = YouTubeSearch> {
    out: W,
    resolver: Resolver<S>,
    history: History,
    last_label: Option<Label>,
    snapshot: Option<PathBuf>,
}

impl<W: Write, S: VideoSearch> Renderer<W, S> {
    pub fn new(out: W, resolver: Resolver<S>) -> Self {
        Self {
            out,
            resolver,
            history: History::default(),
            last_label: None,
            snapshot: None,
        }
    }

    /// Also write each annotated frame to `path`.
    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot = path;
        self
    }

    /// Print one result; recommendations are refreshed when the label changes.
    pub async fn render(&mut self, result: &FrameResult) -> std::io::Result<()> {
        let c = &result.classification;
        self.history.record(c.label);

        write!(
            self.out,
            "[{}] {} {}",
            result.captured_at.format("%H:%M:%S"),
            emoji(&c.label),
            caption(c).to_uppercase()
        )?;
        if let Some(face) = c.face {
            write!(
                self.out,
                "  face {}x{} at ({}, {})",
                face.width, face.height, face.x, face.y
            )?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "  recent: {}", self.history.summary())?;

        if self.last_label != Some(c.label) {
            self.last_label = Some(c.label);
            let recs = self.resolver.resolve(&c.label.as_str()).await;
            writeln!(self.out, "  songs for {}:", c.label)?;
            print_recommendations(&mut self.out, &recs)?;
        }
        self.out.flush()?;

        if let Some(path) = &self.snapshot {
            if let Err(e) = result.annotated.save(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to write snapshot");
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
