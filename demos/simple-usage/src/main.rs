use std::borrow::Cow;

use async_trait::async_trait;
use rangeview::collection::{AdapterError, DataAdapter, ListItem, LoadOutcome, OffsetParams, ResponseMeta};
use rangeview::renderer::{ItemMarkup, ItemView};
use rangeview::{Adapter, ItemTemplate, VirtualList};
use yew::prelude::*;

const ITEM_COUNT: usize = 100;

#[derive(Clone, PartialEq)]
struct Row {
    idx: usize,
}

impl ListItem for Row {
    fn stable_id(&self) -> Cow<'_, str> {
        Cow::Owned(self.idx.to_string())
    }
}

/// An in-memory adapter standing in for a real backend: every offset range
/// is answered synchronously from a fixed-size `Vec`.
struct RowAdapter {
    rows: Vec<Row>,
}

impl RowAdapter {
    fn new(count: usize) -> Self {
        Self {
            rows: (0..count).map(|idx| Row { idx }).collect(),
        }
    }
}

#[async_trait(?Send)]
impl DataAdapter<Row> for RowAdapter {
    async fn load_range(&self, params: OffsetParams) -> Result<LoadOutcome<Row>, AdapterError> {
        let end = (params.offset + params.limit).min(self.rows.len());
        let items = if params.offset >= self.rows.len() {
            Vec::new()
        } else {
            self.rows[params.offset..end].to_vec()
        };
        Ok(LoadOutcome {
            items,
            meta: ResponseMeta { total: Some(self.rows.len()) },
        })
    }

    fn supports_range(&self) -> bool {
        true
    }
}

fn render_row(view: ItemView<'_, Row>, index: usize) -> ItemMarkup {
    let label = match view {
        ItemView::Loaded(row) => format!("Item {}", row.idx),
        ItemView::Placeholder(_) => "...".to_string(),
    };
    ItemMarkup::Html(format!(r#"<div class="item" data-index="{index}">{label}</div>"#))
}

#[function_component(App)]
fn app() -> Html {
    let adapter = Adapter::new(RowAdapter::new(ITEM_COUNT));
    let template = ItemTemplate::new(render_row);

    html! {
        <VirtualList<Row, RowAdapter>
            {adapter}
            {template}
            initial_total_items={ITEM_COUNT}
            classes={classes!("scrollbar")}
        />
    }
}

fn main() {
    yew::start_app::<App>();
}
