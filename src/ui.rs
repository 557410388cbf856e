use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span, Text},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget},
};
use oceanchat_core::{Chart as ChartPayload, Message, NormalizedPayload, Sender, Table};
use crate::app::{App, InputMode};

/// Rows shown per table before the rest is summarized
const MAX_TABLE_ROWS: usize = 100;
/// Widest a table column may grow before cells are cut
const MAX_COLUMN_WIDTH: usize = 24;
const CHART_HEIGHT: u16 = 14;

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.controller.current_view();
    let attached = match view.attached_file {
        Some(name) => format!(" [{}]", name),
        None => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(" OceanGPT ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.backend_label.clone(), Style::default().fg(Color::Gray)),
        Span::styled(attached, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" Conversation ");
    let inner = block.inner(area);

    let view = app.controller.current_view();
    let mut lines: Vec<Line<'static>> = Vec::new();

    if view.messages.is_empty() && !view.in_flight {
        lines.push(Line::from(Span::styled(
            "Ask about sea level, temperature or salinity, or press Ctrl+O to attach a CSV.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    for message in view.messages {
        lines.extend(message_lines(message, inner.width));
        lines.push(Line::default());
    }

    if view.in_flight {
        lines.push(sender_label(Sender::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(app.animation_frame + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Lines are pre-wrapped, so the count is exact
    app.chat_height = inner.height;
    app.total_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    if app.follow {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.scroll, 0));
    frame.render_widget(chat, area);
}

fn sender_label(sender: Sender) -> Line<'static> {
    let color = match sender {
        Sender::User => Color::Green,
        Sender::Assistant => Color::Yellow,
        Sender::System => Color::Magenta,
    };
    Line::from(Span::styled(
        format!("{}:", sender.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn message_lines(message: &Message, width: u16) -> Vec<Line<'static>> {
    let mut lines = vec![sender_label(message.sender)];

    let text_style = if message.sender == Sender::System {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    for paragraph in message.text.lines() {
        for wrapped in wrap_text_to_width(paragraph, width as usize) {
            lines.push(Line::from(Span::styled(wrapped, text_style)));
        }
    }

    match &message.payload {
        NormalizedPayload::None => {}
        NormalizedPayload::Table(table) => lines.extend(table_lines(table)),
        NormalizedPayload::Chart(chart) => lines.extend(chart_lines(chart, width)),
    }

    lines
}

/// Wrap text to fit within a given width, breaking at word boundaries
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: String = word.to_string();
        let mut word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(&word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
        }

        // Hard-break words longer than a whole line
        while word_len > width {
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            word_len -= width;
            lines.push(head);
        }
        current = word;
        current_len = word_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Cut `text` to `width` characters, marking the cut with an ellipsis
fn fit_cell(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        return format!("{:<width$}", text, width = width);
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn table_lines(table: &Table) -> Vec<Line<'static>> {
    let shown = table.rows.len().min(MAX_TABLE_ROWS);

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let widest_cell = table.rows[..shown]
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.to_string().chars().count())
                .max()
                .unwrap_or(0);
            name.chars().count().max(widest_cell).clamp(1, MAX_COLUMN_WIDTH)
        })
        .collect();

    let border = Style::default().fg(Color::DarkGray);
    let separator = Span::styled(" │ ", border);

    let mut lines = Vec::with_capacity(shown + 3);

    let mut header = Vec::new();
    for (col, name) in table.columns.iter().enumerate() {
        if col > 0 {
            header.push(separator.clone());
        }
        header.push(Span::styled(
            fit_cell(name, widths[col]),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }
    lines.push(Line::from(header));

    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    lines.push(Line::from(Span::styled(rule.join("─┼─"), border)));

    for row in &table.rows[..shown] {
        let mut spans = Vec::new();
        for (col, width) in widths.iter().enumerate() {
            if col > 0 {
                spans.push(separator.clone());
            }
            let text = row.get(col).map(|cell| cell.to_string()).unwrap_or_default();
            spans.push(Span::raw(fit_cell(&text, *width)));
        }
        lines.push(Line::from(spans));
    }

    if table.rows.len() > shown {
        lines.push(Line::from(Span::styled(
            format!("… {} more rows", table.rows.len() - shown),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Plot points for one series. Non-numeric x-values fall back to their index.
fn series_points(chart: &ChartPayload, series: usize, numeric_x: bool) -> Vec<(f64, f64)> {
    chart
        .points(series)
        .into_iter()
        .enumerate()
        .filter_map(|(i, (x, y))| {
            let x = if numeric_x { x.as_f64()? } else { i as f64 };
            let y = y?.as_f64()?;
            Some((x, y))
        })
        .collect()
}

/// Pad a `[min, max]` range so flat data still gets a visible axis
fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    if (max - min).abs() < f64::EPSILON {
        return [min - 1.0, max + 1.0];
    }
    let pad = (max - min) * 0.05;
    [min - pad, max + pad]
}

fn axis_label(value: f64) -> Span<'static> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Span::raw(format!("{}", value as i64))
    } else {
        Span::raw(format!("{:.2}", value))
    }
}

fn chart_lines(chart: &ChartPayload, width: u16) -> Vec<Line<'static>> {
    if width < 10 {
        return Vec::new();
    }

    let numeric_x = !chart.x_values.is_empty() && chart.x_values.iter().all(|x| x.as_f64().is_some());
    let points: Vec<Vec<(f64, f64)>> = (0..chart.series.len())
        .map(|i| series_points(chart, i, numeric_x))
        .collect();

    if points.iter().all(|p| p.is_empty()) {
        return vec![Line::from(Span::styled(
            "(chart has no numeric points)",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))];
    }

    let x_bounds = padded_bounds(points.iter().flatten().map(|(x, _)| *x));
    let y_bounds = padded_bounds(points.iter().flatten().map(|(_, y)| *y));

    let x_labels = if numeric_x {
        vec![axis_label(x_bounds[0]), axis_label(x_bounds[1])]
    } else {
        let first = chart.x_values.first().map(|x| x.to_string()).unwrap_or_default();
        let last = chart.x_values.last().map(|x| x.to_string()).unwrap_or_default();
        vec![Span::raw(first), Span::raw(last)]
    };

    let datasets: Vec<Dataset<'_>> = chart
        .series
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (series, data))| {
            Dataset::default()
                .name(series.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();

    let widget = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![axis_label(y_bounds[0]), axis_label(y_bounds[1])]),
        );

    let area = Rect::new(0, 0, width, CHART_HEIGHT);
    let mut buffer = Buffer::empty(area);
    widget.render(area, &mut buffer);
    buffer_lines(&buffer)
}

/// Copy an off-screen buffer into transcript lines so charts scroll with the text
fn buffer_lines(buffer: &Buffer) -> Vec<Line<'static>> {
    let area = buffer.area;
    let cells = buffer.content();
    (0..area.height as usize)
        .map(|y| {
            let row = &cells[y * area.width as usize..(y + 1) * area.width as usize];
            let spans: Vec<Span<'static>> = row
                .iter()
                .map(|cell| Span::styled(cell.symbol().to_string(), cell.style()))
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let in_flight = app.in_flight();

    let (title, input, cursor, color) = match app.input_mode {
        InputMode::Message => {
            let title = if in_flight { " Waiting for reply... " } else { " Message " };
            (title, app.input.as_str(), app.cursor, if in_flight { Color::DarkGray } else { Color::Green })
        }
        InputMode::AttachPath => (
            " CSV file path (Enter upload, Esc cancel) ",
            app.path_input.as_str(),
            app.path_cursor,
            Color::Yellow,
        ),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title);
    let inner = block.inner(area);

    // Keep the cursor visible on long input
    let visible = inner.width.saturating_sub(1) as usize;
    let offset = cursor.saturating_sub(visible);
    let shown: String = input.chars().skip(offset).collect();

    frame.render_widget(Paragraph::new(shown).block(block), area);

    if inner.width > 0 {
        let x = inner.x + (cursor - offset) as u16;
        frame.set_cursor_position((x, inner.y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let spans = match app.input_mode {
        InputMode::Message => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Ctrl+O ", key_style),
            Span::styled(" attach CSV ", label_style),
            Span::styled(" Ctrl+R ", key_style),
            Span::styled(" reset ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::AttachPath => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" upload ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
    };

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
