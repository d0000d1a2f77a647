use crate::compose::ComposedView;
use crate::dom::{el, escape_text, render, text, Element, VNode};
use crate::widget::{Dashboard, Widget};

const LUCIDE_SRC: &str = "https://unpkg.com/lucide@0.453.0/dist/umd/lucide.min.js";

const STYLE: &str = "\
*{box-sizing:border-box}\
body{margin:0;font-family:system-ui,sans-serif}\
.dw-board{display:grid;grid-template-columns:repeat(4,1fr);grid-auto-rows:minmax(160px,auto);gap:12px;padding:12px;min-height:100vh}\
.dw-board.dw-black{background:#000}\
.dw-slot{min-width:0}\
.dw-widget{height:100%;border-radius:12px;padding:12px;overflow:hidden}\
.dw-widget-title{display:flex;gap:6px;align-items:center;font-weight:600;margin-bottom:8px}\
.dw-icon{width:1em;height:1em}\
.dw-progress-track{height:6px;border-radius:3px;overflow:hidden}\
.dw-progress-bar{height:100%}\
.dw-calendar-weekdays,.dw-calendar-grid{display:grid;grid-template-columns:repeat(7,1fr);text-align:center}\
.dw-day-past{opacity:.5}.dw-day-today{font-weight:700}\
.dw-clock-time{font-size:2.5rem}.dw-clock-zones{list-style:none;padding:0}\
.dw-modal[hidden]{display:none}\
.dw-chart{width:100%;height:48px}.dw-chart-preview{width:40%;height:16px}";

/// Client half of the live protocol: delegates bound events to the socket,
/// applies patch ops by element id and reloads after the socket closes.
fn client_js(ws_path: &str, view_id: &str) -> String {
    let quote = |value: &str| value.replace('\\', "\\\\").replace('"', "\\\"");
    let (ws_path, view_id) = (quote(ws_path), quote(view_id));
    format!(
        "(function(){{\
const wsUrl=(location.protocol==='https:'?'wss://':'ws://')+location.host+\"{ws_path}\";\
const socket=new WebSocket(wsUrl);\
function send(obj){{ try{{socket.send(JSON.stringify(obj));}}catch(_){{}} }}\
function closestWithAttr(el,attr){{ while(el&&el!==document.body){{ if(el.getAttribute&&el.getAttribute(attr)) return el; el=el.parentNode; }} return null; }}\
function forward(kind,ev){{ const el=closestWithAttr(ev.target,'data-dw-on-'+kind); if(!el) return; const root=closestWithAttr(el,'data-dw-widget'); if(!root) return;\
  const msg={{t:'event',widget:root.getAttribute('data-dw-widget'),event:kind,handler:el.getAttribute('data-dw-on-'+kind)}};\
  if('value'in ev.target) msg.value=String(ev.target.value); send(msg); }}\
document.addEventListener('click',function(ev){{ forward('click',ev); }});\
document.addEventListener('change',function(ev){{ forward('change',ev); }});\
function applyOp(op){{\
  if(op.op==='refreshIcons'){{ if(window.lucide) window.lucide.createIcons(); return; }}\
  const node=document.getElementById(op.id); if(!node) return;\
  if(op.op==='replace'){{ node.outerHTML=op.html; return; }}\
  if(op.op==='setText'){{ node.textContent=op.text; return; }}\
  if(op.op==='setAttr'){{ node.setAttribute(op.name,op.value); return; }}\
  if(op.op==='removeAttr'){{ node.removeAttribute(op.name); return; }}\
}}\
socket.addEventListener('open',function(){{ send({{t:'hello',view:\"{view_id}\"}}); }});\
socket.addEventListener('message',function(ev){{\
  let msg=null; try{{ msg=JSON.parse(ev.data); }}catch(_){{ return; }}\
  if(!msg||msg.t!=='patch'||!Array.isArray(msg.ops)) return;\
  for(const op of msg.ops) applyOp(op);\
}});\
socket.addEventListener('close',function(){{ setTimeout(function(){{ location.reload(); }},5000); }});\
}})();"
    )
}

/// CSS grid placement of a widget; layout indices are zero-based.
fn placement(widget: &Widget) -> String {
    let layout = &widget.layout;
    format!(
        "grid-column: {} / span {}; grid-row: {} / span {}",
        layout.column_index + 1,
        layout.column_count.unwrap_or(1).max(1),
        layout.row_index + 1,
        layout.row_count.unwrap_or(1).max(1)
    )
}

fn board(view: &ComposedView) -> Element {
    let slots = view.widgets.iter().zip(&view.htmls).map(|(widget, html)| {
        el("div")
            .class("dw-slot")
            .attr("data-dw-slot", widget.id.as_str())
            .style(placement(widget))
            .child(VNode::Raw(html.clone()))
            .into()
    });
    let mut board = el("main").id("dw-board").class("dw-board");
    if view.dashboard.is_black_theme {
        board = board.class("dw-black");
    }
    board.children(slots)
}

fn document(title: &str, body: &str, script: &str) -> String {
    format!(
        "<!doctype html>\
<html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>{}</title>\
<style>{STYLE}</style>\
<script src=\"{LUCIDE_SRC}\"></script>\
</head><body>{body}<script>{script}</script></body></html>",
        escape_text(title)
    )
}

const ICONS_ON_LOAD: &str =
    "window.addEventListener('load',function(){ if(window.lucide) window.lucide.createIcons(); });";

/// Page for a live view; the client claims `view_id` over `ws_path`.
pub fn live_page(view: &ComposedView, ws_path: &str, view_id: &str) -> String {
    let body = render(&board(view).attr("data-dw-view", view_id).into());
    let script = format!("{ICONS_ON_LOAD}{}", client_js(ws_path, view_id));
    document(&view.dashboard.name, &body, &script)
}

/// Self-contained markup without a socket.
pub fn static_page(view: &ComposedView) -> String {
    let body = render(&board(view).into());
    document(&view.dashboard.name, &body, ICONS_ON_LOAD)
}

pub fn index_page(dashboards: &[Dashboard]) -> String {
    let rows: Vec<VNode> = dashboards
        .iter()
        .map(|dashboard| {
            el("li")
                .child(
                    el("a")
                        .attr("href", format!("/d/{}", dashboard.id))
                        .text(dashboard.name.as_str()),
                )
                .child(text(" "))
                .child(
                    el("a")
                        .class("dw-preview-link")
                        .attr("href", format!("/d/{}/preview", dashboard.id))
                        .text("preview"),
                )
                .into()
        })
        .collect();
    let body = el("div")
        .class("dw-index")
        .child(el("h1").text("Dashboards"))
        .child(el("ul").children(rows));
    document("Dashboards", &render(&body.into()), "")
}

pub fn not_found_page(what: &str) -> String {
    let body = el("p").class("dw-not-found").text(format!("{what} not found"));
    document("Not found", &render(&body.into()), "")
}
