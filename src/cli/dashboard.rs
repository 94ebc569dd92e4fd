use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use tracing::{debug, info};

use crate::aggregate::{purchases_over_time, weekday_profile, Bucket, Interval, WeekdayProfile};
use crate::cli::report::{no_weekday_data, NO_DATA};
use crate::cli::Source;
use crate::error::Result;
use crate::filter::{
    apply, distinct_brands, Bounds, BrandFilter, CarrierScope, Resolved, Selection, ALL_LABEL,
    HOUR_BOUNDS,
};
use crate::fmt::{money, number};
use crate::models::{weekday_name, Table};
use crate::tui::{
    control_line, install_panic_hook, list_window, warning_lines, BOLD, FOCUS_STYLE, FOOTER_STYLE,
    HEADER_STYLE, SERIES_STYLE,
};

const SIDEBAR_WIDTH: u16 = 38;

/// Number of amount-slider steps across the brand subset's span.
const AMOUNT_STEPS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Brand,
    FromDate,
    ToDate,
    HourMin,
    HourMax,
    AmountMin,
    AmountMax,
    Interval,
    Weekday,
    Carriers,
    Services,
}

const CONTROLS: [Control; 11] = [
    Control::Brand,
    Control::FromDate,
    Control::ToDate,
    Control::HourMin,
    Control::HourMax,
    Control::AmountMin,
    Control::AmountMax,
    Control::Interval,
    Control::Weekday,
    Control::Carriers,
    Control::Services,
];

/// Everything drawn on screen, recomputed from scratch after each change.
struct View {
    resolved: Resolved,
    matched: usize,
    timeline: Vec<Bucket>,
    profile: WeekdayProfile,
}

pub struct Dashboard {
    table: Table,
    scope: CarrierScope,
    brand_labels: Vec<String>,
    selection: Selection,
    interval: Interval,
    weekday: Weekday,
    focus: usize,
    carrier_cursor: usize,
    service_cursor: usize,
    view: View,
    status_message: Option<String>,
}

impl Dashboard {
    pub fn new(table: Table, scope: CarrierScope, interval: Interval) -> Self {
        let mut brand_labels = vec![ALL_LABEL.to_string()];
        brand_labels.extend(distinct_brands(&table.records));
        let selection = Selection::default();
        let weekday = Weekday::Mon;
        let view = compute_view(&table, &selection, scope, interval, weekday);
        Self {
            table,
            scope,
            brand_labels,
            selection,
            interval,
            weekday,
            focus: 0,
            carrier_cursor: 0,
            service_cursor: 0,
            view,
            status_message: None,
        }
    }

    fn focused(&self) -> Control {
        CONTROLS[self.focus]
    }

    fn recompute(&mut self) {
        self.view = compute_view(
            &self.table,
            &self.selection,
            self.scope,
            self.interval,
            self.weekday,
        );
        // Carrier rows are preceded by the "All" toggle.
        self.carrier_cursor = self.carrier_cursor.min(self.view.resolved.options.carriers.len());
        self.service_cursor = self
            .service_cursor
            .min(self.view.resolved.offered_services.len().saturating_sub(1));
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        self.status_message = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.move_focus(1),
            KeyCode::BackTab => self.move_focus(-1),
            KeyCode::Up => self.move_vertical(-1),
            KeyCode::Down => self.move_vertical(1),
            KeyCode::Left => self.adjust(-1),
            KeyCode::Right => self.adjust(1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle(),
            KeyCode::Char('r') => {
                self.selection = Selection::default();
                self.carrier_cursor = 0;
                self.service_cursor = 0;
                self.recompute();
                self.status_message = Some("Filters reset.".to_string());
            }
            _ => {}
        }
        false
    }

    fn move_focus(&mut self, delta: i32) {
        let len = CONTROLS.len() as i32;
        self.focus = (self.focus as i32 + delta).rem_euclid(len) as usize;
    }

    fn move_vertical(&mut self, delta: i32) {
        match self.focused() {
            Control::Carriers => {
                let rows = self.view.resolved.options.carriers.len() + 1;
                match step_cursor(self.carrier_cursor, rows, delta) {
                    Some(c) => self.carrier_cursor = c,
                    None => self.move_focus(delta),
                }
            }
            Control::Services => {
                let rows = self.view.resolved.offered_services.len();
                match step_cursor(self.service_cursor, rows, delta) {
                    Some(c) => self.service_cursor = c,
                    None => self.move_focus(delta),
                }
            }
            _ => self.move_focus(delta),
        }
    }

    fn adjust(&mut self, delta: i32) {
        let params = &self.view.resolved.params;
        let options = &self.view.resolved.options;
        match self.focused() {
            Control::Brand => {
                let current = match &self.selection.brand {
                    BrandFilter::All => 0,
                    BrandFilter::Only(b) => self
                        .brand_labels
                        .iter()
                        .position(|l| l == b)
                        .unwrap_or(0),
                };
                let len = self.brand_labels.len() as i32;
                let next = (current as i32 + delta).rem_euclid(len) as usize;
                // Ranges and lists default to the new brand's data.
                self.selection = Selection {
                    brand: BrandFilter::from_label(&self.brand_labels[next]),
                    hours: self.selection.hours,
                    ..Selection::default()
                };
                self.carrier_cursor = 0;
                self.service_cursor = 0;
                info!(brand = %self.selection.brand, "brand changed");
            }
            Control::FromDate | Control::ToDate => {
                let (Some(current), Some(limits)) = (params.dates, options.date_bounds) else {
                    return;
                };
                let shift = |d: NaiveDate| {
                    d.checked_add_signed(Duration::days(delta as i64)).unwrap_or(d)
                };
                let next = if self.focused() == Control::FromDate {
                    let min = Bounds { min: limits.min, max: current.max }.clamp(shift(current.min));
                    Bounds { min, max: current.max }
                } else {
                    let max = Bounds { min: current.min, max: limits.max }.clamp(shift(current.max));
                    Bounds { min: current.min, max }
                };
                self.selection.dates = Some(next);
            }
            Control::HourMin | Control::HourMax => {
                let current = params.hours;
                let shift = |h: u32| (h as i32 + delta).clamp(0, HOUR_BOUNDS.max as i32) as u32;
                let next = if self.focused() == Control::HourMin {
                    Bounds { min: shift(current.min).min(current.max), max: current.max }
                } else {
                    Bounds { min: current.min, max: shift(current.max).max(current.min) }
                };
                self.selection.hours = Some(next);
            }
            Control::AmountMin | Control::AmountMax => {
                let (Some(current), Some(limits)) = (params.amounts, options.amount_bounds) else {
                    return;
                };
                let span = limits.max - limits.min;
                let step = if span > 0.0 { span / AMOUNT_STEPS } else { 1.0 };
                let next = if self.focused() == Control::AmountMin {
                    let min = Bounds { min: limits.min, max: current.max }
                        .clamp(current.min + delta as f64 * step);
                    Bounds { min, max: current.max }
                } else {
                    let max = Bounds { min: current.min, max: limits.max }
                        .clamp(current.max + delta as f64 * step);
                    Bounds { min: current.min, max }
                };
                self.selection.amounts = Some(next);
            }
            Control::Interval => {
                let all = Interval::ALL;
                let current = all.iter().position(|i| *i == self.interval).unwrap_or(0);
                let next = (current as i32 + delta).rem_euclid(all.len() as i32) as usize;
                self.interval = all[next];
            }
            Control::Weekday => {
                self.weekday = if delta > 0 {
                    self.weekday.succ()
                } else {
                    self.weekday.pred()
                };
            }
            Control::Carriers | Control::Services => return,
        }
        self.recompute();
    }

    fn toggle(&mut self) {
        match self.focused() {
            Control::Carriers => {
                let available = self.view.resolved.options.carriers.clone();
                let mut picked = self.view.resolved.params.carriers.clone();
                if self.carrier_cursor == 0 {
                    if picked.len() == available.len() {
                        picked.clear();
                    } else {
                        picked = available.clone();
                    }
                } else if let Some(carrier) = available.get(self.carrier_cursor - 1) {
                    toggle_member(&mut picked, carrier);
                }
                // Keep carriers in first-seen order.
                picked = available.into_iter().filter(|c| picked.contains(c)).collect();
                debug!(?picked, "carriers changed");
                self.selection.carriers = Some(picked);
                self.selection.services = None;
            }
            Control::Services => {
                let offered = self.view.resolved.offered_services.clone();
                let Some(service) = offered.get(self.service_cursor) else {
                    return;
                };
                let mut picked = self.view.resolved.params.services.clone();
                toggle_member(&mut picked, service);
                self.selection.services =
                    Some(offered.iter().filter(|s| picked.contains(s)).cloned().collect());
            }
            _ => return,
        }
        self.recompute();
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep, body_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" Payment Data - {}", self.selection.brand)).style(HEADER_STYLE),
            header_area,
        );
        let sep_line = "━".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let [sidebar_area, charts_area] = Layout::horizontal([
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .areas(body_area);
        self.draw_sidebar(frame, sidebar_area);

        let [timeline_area, weekday_area] = Layout::vertical([
            Constraint::Percentage(50),
            Constraint::Percentage(50),
        ])
        .areas(charts_area);
        self.draw_timeline(frame, timeline_area);
        self.draw_weekday(frame, weekday_area);

        if let Some(msg) = &self.status_message {
            frame.render_widget(
                Paragraph::new(format!(" {msg}")).style(Style::default().fg(Color::Yellow)),
                hints_area,
            );
        } else {
            frame.render_widget(
                Paragraph::new(
                    " Tab/Up/Down=focus  Left/Right=adjust  Space=toggle  r=reset  q=quit",
                )
                .style(FOOTER_STYLE),
                hints_area,
            );
        }
    }

    fn draw_sidebar(&self, frame: &mut Frame, area: Rect) {
        let params = &self.view.resolved.params;
        let options = &self.view.resolved.options;
        let carrier_rows = options.carriers.len() as u16 + 2;

        let [controls_area, carriers_area, services_area] = Layout::vertical([
            Constraint::Length(12),
            Constraint::Max(carrier_rows.min(10)),
            Constraint::Fill(1),
        ])
        .areas(area);

        let focus = self.focused();
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        let amount = |v: Option<f64>| v.map(money).unwrap_or_else(|| "-".into());
        let lines = vec![
            Line::from(Span::styled(" Filters", BOLD)),
            control_line(
                "Brand",
                format!("< {} >", brand_label(&self.selection.brand)),
                focus == Control::Brand,
            ),
            control_line("From", date(params.dates.map(|b| b.min)), focus == Control::FromDate),
            control_line("To", date(params.dates.map(|b| b.max)), focus == Control::ToDate),
            control_line("Hour min", params.hours.min.to_string(), focus == Control::HourMin),
            control_line("Hour max", params.hours.max.to_string(), focus == Control::HourMax),
            control_line("Amount min", amount(params.amounts.map(|b| b.min)), focus == Control::AmountMin),
            control_line("Amount max", amount(params.amounts.map(|b| b.max)), focus == Control::AmountMax),
            control_line("Interval", format!("< {} >", self.interval), focus == Control::Interval),
            control_line(
                "Weekday",
                format!("< {} >", weekday_name(self.weekday)),
                focus == Control::Weekday,
            ),
            Line::from(""),
            Line::from(format!("   Matching   {}", number(self.view.matched))),
        ];
        frame.render_widget(Paragraph::new(lines), controls_area);

        // Carriers: "All" toggle followed by each carrier of the brand subset.
        let mut carrier_entries = vec![(
            ALL_LABEL.to_string(),
            !options.carriers.is_empty() && params.carriers.len() == options.carriers.len(),
        )];
        carrier_entries.extend(
            options
                .carriers
                .iter()
                .map(|c| (c.clone(), params.carriers.contains(c))),
        );
        self.draw_checklist(
            frame,
            carriers_area,
            &format!(" Carriers ({}/{})", params.carriers.len(), options.carriers.len()),
            &carrier_entries,
            (focus == Control::Carriers).then_some(self.carrier_cursor),
        );

        let service_entries: Vec<(String, bool)> = self
            .view
            .resolved
            .offered_services
            .iter()
            .map(|s| (s.clone(), params.services.contains(s)))
            .collect();
        self.draw_checklist(
            frame,
            services_area,
            &format!(
                " Services ({}/{})",
                params.services.len(),
                self.view.resolved.offered_services.len()
            ),
            &service_entries,
            (focus == Control::Services).then_some(self.service_cursor),
        );
    }

    fn draw_checklist(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        entries: &[(String, bool)],
        cursor: Option<usize>,
    ) {
        let mut lines = vec![Line::from(Span::styled(title.to_string(), BOLD))];
        if entries.is_empty() {
            lines.push(Line::from(Span::styled("   (none)", FOOTER_STYLE)));
        }
        let height = area.height.saturating_sub(1) as usize;
        let (start, end) = list_window(entries.len(), cursor.unwrap_or(0), height);
        for (i, (label, checked)) in entries.iter().enumerate().take(end).skip(start) {
            let focused = cursor == Some(i);
            let marker = if focused { ">" } else { " " };
            let check = if *checked { "[x]" } else { "[ ]" };
            let style = if focused { FOCUS_STYLE } else { Style::default() };
            lines.push(Line::from(Span::styled(format!("{marker} {check} {label}"), style)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_timeline(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(format!(" Purchases across a period of time ({}) ", self.interval))
            .title_style(BOLD)
            .borders(Borders::ALL)
            .border_style(FOOTER_STYLE);

        let (Some(first), Some(last)) = (self.view.timeline.first(), self.view.timeline.last())
        else {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new(warning_lines(NO_DATA, inner.width.saturating_sub(2) as usize)),
                inner,
            );
            return;
        };

        let origin = first.start;
        let minutes_since = |ts: NaiveDateTime| (ts - origin).num_minutes() as f64;
        let points: Vec<(f64, f64)> = self
            .view
            .timeline
            .iter()
            .map(|b| (minutes_since(b.start), b.count as f64))
            .collect();
        let x_max = minutes_since(last.start).max(1.0);
        let mid = origin + Duration::minutes((x_max / 2.0) as i64);
        let x_labels = vec![
            Span::raw(origin.format("%m-%d %H:%M").to_string()),
            Span::raw(mid.format("%m-%d %H:%M").to_string()),
            Span::raw(last.start.format("%m-%d %H:%M").to_string()),
        ];
        let y_max = self.view.timeline.iter().map(|b| b.count).max().unwrap_or(0);

        let dataset = Dataset::default()
            .name("purchases")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(SERIES_STYLE)
            .data(&points);
        let chart = Chart::new(vec![dataset])
            .block(block)
            .x_axis(
                Axis::default()
                    .title("Time")
                    .style(FOOTER_STYLE)
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(count_axis("Number of Purchases", y_max));
        frame.render_widget(chart, area);
    }

    fn draw_weekday(&self, frame: &mut Frame, area: Rect) {
        let range = self
            .view
            .resolved
            .params
            .dates
            .map(|b| format!(" ({} to {})", b.min, b.max))
            .unwrap_or_default();
        let block = Block::default()
            .title(format!(
                " Average purchases on {}s{} ",
                weekday_name(self.weekday),
                range
            ))
            .title_style(BOLD)
            .borders(Borders::ALL)
            .border_style(FOOTER_STYLE);

        if self.view.profile.is_empty() {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let text = no_weekday_data(self.weekday);
            frame.render_widget(
                Paragraph::new(warning_lines(&text, inner.width.saturating_sub(2) as usize)),
                inner,
            );
            return;
        }

        let points: Vec<(f64, f64)> = self
            .view
            .profile
            .slots
            .iter()
            .map(|s| {
                let minute = s.time.num_seconds_from_midnight() as f64 / 60.0;
                (minute, s.count as f64)
            })
            .collect();
        let y_max = self.view.profile.slots.iter().map(|s| s.count).max().unwrap_or(0);
        let x_labels = ["00:00", "06:00", "12:00", "18:00", "24:00"]
            .into_iter()
            .map(Span::raw)
            .collect::<Vec<_>>();

        let dataset = Dataset::default()
            .name(format!("{} day(s)", self.view.profile.days))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(SERIES_STYLE)
            .data(&points);
        let chart = Chart::new(vec![dataset])
            .block(block)
            .x_axis(
                Axis::default()
                    .title("Time of Day (15-minute intervals)")
                    .style(FOOTER_STYLE)
                    .bounds([0.0, 24.0 * 60.0])
                    .labels(x_labels),
            )
            .y_axis(count_axis("Purchases", y_max));
        frame.render_widget(chart, area);
    }
}

fn compute_view(
    table: &Table,
    selection: &Selection,
    scope: CarrierScope,
    interval: Interval,
    weekday: Weekday,
) -> View {
    let resolved = selection.resolve(table, scope);
    let filtered = apply(&table.records, &resolved.params);
    let timeline = purchases_over_time(&filtered, interval);
    let profile = weekday_profile(&filtered, weekday, resolved.date_span());
    debug!(
        matched = filtered.len(),
        buckets = timeline.len(),
        slots = profile.slots.len(),
        "recomputed view"
    );
    View {
        matched: filtered.len(),
        resolved,
        timeline,
        profile,
    }
}

fn brand_label(brand: &BrandFilter) -> &str {
    match brand {
        BrandFilter::All => ALL_LABEL,
        BrandFilter::Only(b) => b,
    }
}

/// Move a list cursor; `None` when the move would leave the list.
fn step_cursor(cursor: usize, rows: usize, delta: i32) -> Option<usize> {
    let next = cursor as i64 + delta as i64;
    if rows == 0 || next < 0 || next >= rows as i64 {
        None
    } else {
        Some(next as usize)
    }
}

fn toggle_member(list: &mut Vec<String>, value: &str) {
    if let Some(pos) = list.iter().position(|v| v == value) {
        list.remove(pos);
    } else {
        list.push(value.to_string());
    }
}

/// Y axis from zero with round top and middle ticks.
fn count_axis(title: &str, max: usize) -> Axis<'static> {
    let top = y_axis_top(max);
    Axis::default()
        .title(title.to_string())
        .style(FOOTER_STYLE)
        .bounds([0.0, top as f64])
        .labels(vec![
            Span::raw("0"),
            Span::raw(number(top / 2)),
            Span::raw(number(top)),
        ])
}

/// Smallest of 2, 4, 6 or 10 times a power of ten at or above `max`.
fn y_axis_top(max: usize) -> usize {
    let mut magnitude = 1usize;
    loop {
        for step in [2usize, 4, 6, 10] {
            let top = step * magnitude;
            if top >= max {
                return top;
            }
        }
        magnitude *= 10;
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

pub fn run(source: &Source) -> Result<()> {
    let table = source.load()?;
    let mut dashboard = Dashboard::new(table, source.carrier_scope, source.default_interval);

    install_panic_hook();
    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| dashboard.draw(frame)) {
            break Err(e.into());
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    break Ok(());
                }
                if dashboard.handle_key(key.code) {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}
