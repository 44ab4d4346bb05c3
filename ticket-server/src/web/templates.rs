//! Askama templates for the web frontend.

use askama::Template;

use crate::domain::{SeatClass, Ticket, TrainFilter};
use crate::transfer::TransferPlan;
use crate::watch::WatchSnapshot;

// ============================================================================
// Page Templates (extend base.html)
// ============================================================================

/// Home page with the query form.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub from: String,
    pub to: String,
    pub date: String,
    pub train_type: String,
    pub filters: Vec<OptionView>,
    pub seat_classes: Vec<OptionView>,
    pub alert_email: String,
    pub watch_interval_secs: u64,
}

/// Error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

// ============================================================================
// Fragment Templates (fetched by app.js, no base.html)
// ============================================================================

/// Direct trains.
#[derive(Template)]
#[template(path = "ticket_list.html")]
pub struct TicketListTemplate {
    pub summary: String,
    pub seat_labels: Vec<&'static str>,
    pub tickets: Vec<TicketView>,
    pub export_query: String,
}

/// One-change itineraries.
#[derive(Template)]
#[template(path = "transfer_list.html")]
pub struct TransferListTemplate {
    pub summary: String,
    pub plans: Vec<TransferView>,
    pub export_query: String,
}

/// Running watches.
#[derive(Template)]
#[template(path = "watch_list.html")]
pub struct WatchListTemplate {
    pub watches: Vec<WatchView>,
}

// ============================================================================
// View Models (for templates)
// ============================================================================

/// A `<select>` option.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl OptionView {
    pub fn train_filters(selected: TrainFilter) -> Vec<Self> {
        TrainFilter::ALL
            .iter()
            .map(|f| OptionView {
                value: f.slug().to_string(),
                label: f.label().to_string(),
                selected: *f == selected,
            })
            .collect()
    }

    pub fn seat_classes() -> Vec<Self> {
        SeatClass::ALL
            .iter()
            .map(|c| OptionView {
                value: c.slug().to_string(),
                label: c.label().to_string(),
                selected: false,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SeatCell {
    pub value: String,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct TicketView {
    pub train: String,
    pub from_name: String,
    pub to_name: String,
    pub depart: String,
    pub arrive: String,
    pub duration: String,
    pub bookable: bool,
    pub note: String,
    pub seats: Vec<SeatCell>,
}

impl TicketView {
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            train: ticket.train_number.to_string(),
            from_name: ticket.from_name.clone(),
            to_name: ticket.to_name.clone(),
            depart: ticket.depart_time.clone(),
            arrive: ticket.arrive_time.clone(),
            duration: ticket.duration.clone(),
            bookable: ticket.bookable,
            note: ticket.note.clone(),
            seats: SeatClass::ALL
                .iter()
                .map(|c| {
                    let a = ticket.seat(*c);
                    SeatCell {
                        value: a.to_string(),
                        available: a.is_available(),
                    }
                })
                .collect(),
        }
    }

    /// Seat summary for compact rows: only classes with tickets.
    pub fn available_summary(&self) -> String {
        let parts: Vec<String> = SeatClass::ALL
            .iter()
            .zip(&self.seats)
            .filter(|(_, cell)| cell.available)
            .map(|(class, cell)| format!("{} {}", class.label(), cell.value))
            .collect();
        if parts.is_empty() {
            "无票".to_string()
        } else {
            parts.join(" · ")
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferView {
    pub first: TicketView,
    pub second: TicketView,
    pub hub_name: String,
    pub cross_station: bool,
    pub layover: String,
    pub total: String,
}

impl TransferView {
    pub fn from_plan(plan: &TransferPlan) -> Self {
        Self {
            first: TicketView::from_ticket(&plan.first),
            second: TicketView::from_ticket(&plan.second),
            hub_name: plan.hub_name.clone(),
            cross_station: plan.cross_station,
            layover: plan.layover.to_string(),
            total: plan.total.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchView {
    pub id: String,
    pub summary: String,
    pub interval_secs: u64,
    pub email: String,
    pub runs: u64,
    pub last_run: String,
    pub last_error: String,
    pub last_matches: usize,
    pub alerts_sent: u64,
}

impl WatchView {
    pub fn from_snapshot(snapshot: &WatchSnapshot) -> Self {
        let status = &snapshot.status;
        Self {
            id: snapshot.id.to_string(),
            summary: snapshot.spec.to_string(),
            interval_secs: snapshot.spec.interval_secs,
            email: snapshot.spec.email.clone().unwrap_or_default(),
            runs: status.runs,
            last_run: status
                .last_run
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "—".to_string()),
            last_error: status.last_error.clone().unwrap_or_default(),
            last_matches: status.last_matches,
            alerts_sent: status.alerts_sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Availability, fixtures::ticket};

    #[test]
    fn ticket_view_cells_follow_seat_order() {
        let t = ticket("G1", "BJP", "SHH", "09:00", "13:28", "04:28", Availability::Count(5));
        let view = TicketView::from_ticket(&t);
        assert_eq!(view.seats.len(), SeatClass::ALL.len());
        assert_eq!(view.seats[2].value, "5");
        assert!(view.seats[2].available);
        assert!(!view.seats[0].available);
        assert_eq!(view.available_summary(), "二等座 5");
    }

    #[test]
    fn sold_out_summary() {
        let t = ticket("G1", "BJP", "SHH", "09:00", "13:28", "04:28", Availability::None);
        assert_eq!(TicketView::from_ticket(&t).available_summary(), "无票");
    }

    #[test]
    fn filter_options_mark_selection() {
        let options = OptionView::train_filters(TrainFilter::Emu);
        let selected: Vec<&str> = options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(selected, vec!["d"]);
    }

    #[test]
    fn ticket_list_renders() {
        let t = ticket("G1", "BJP", "SHH", "09:00", "13:28", "04:28", Availability::Plenty);
        let html = TicketListTemplate {
            summary: "北京 → 上海".to_string(),
            seat_labels: SeatClass::ALL.iter().map(|c| c.label()).collect(),
            tickets: vec![TicketView::from_ticket(&t)],
            export_query: "from=BJP&to=SHH".to_string(),
        }
        .render()
        .unwrap();
        assert!(html.contains("G1"));
        assert!(html.contains("商务座"));
        assert!(html.contains("有"));
    }

    #[test]
    fn empty_watch_list_renders() {
        let html = WatchListTemplate { watches: vec![] }.render().unwrap();
        assert!(html.contains("没有"));
    }
}
