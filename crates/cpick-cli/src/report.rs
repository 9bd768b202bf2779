use cpick_core::{MovieDetail, MovieRecord};
use crossterm::style::Stylize;

const UNKNOWN: &str = "(unknown)";

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub color: bool,
}

impl Report {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Title and duration on one tab-separated line.
    pub fn render(&self, movie: &MovieRecord) -> String {
        self.title_line(
            movie.display_title(),
            movie.duration.as_deref().unwrap_or(UNKNOWN),
        )
    }

    pub fn render_detail(&self, detail: &MovieDetail) -> String {
        self.title_line(&detail.title, &detail.duration)
    }

    pub fn render_history(&self, movies: &[MovieRecord]) -> String {
        if movies.is_empty() {
            return "Nothing watched yet.".to_string();
        }
        movies
            .iter()
            .map(|movie| {
                let date = movie
                    .watched_at
                    .map(|ts| ts.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                let date = if self.color {
                    date.dark_grey().to_string()
                } else {
                    date
                };
                format!("{date}  {}", self.render(movie))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_listing(&self, movies: &[MovieRecord]) -> String {
        movies
            .iter()
            .map(|movie| {
                let state = format!("{:<10}", movie.state().as_str());
                let state = if self.color {
                    state.green().to_string()
                } else {
                    state
                };
                format!(
                    "{:>5}  {state}  {}  {}",
                    movie.id,
                    movie.tag,
                    movie.title.as_deref().unwrap_or("")
                )
                .trim_end()
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn title_line(&self, title: &str, duration: &str) -> String {
        if self.color {
            format!("{}\t{}", title.blue(), duration.yellow())
        } else {
            format!("{title}\t{duration}")
        }
    }
}
