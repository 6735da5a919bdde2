/// Stylesheet inlined into every page. Dark card layout, no external assets.
pub const STYLE: &str = r#"
:root {
  --bg: #0f1115;
  --card: #151823;
  --card-hover: #1a1f2e;
  --text: #e6e9ef;
  --muted: #a0a6b5;
  --primary: #8ab4f8;
  --border: #222737;
  --btn: #222945;
  --btn-hover: #2b365e;
  --input: #111521;
  --input-border: #2a3350;
  --radius: 16px;
}
* { box-sizing: border-box; }
html, body { height: 100%; }
body {
  margin: 0;
  background: var(--bg);
  color: var(--text);
  font: 16px/1.6 system-ui, -apple-system, "Segoe UI", sans-serif;
  display: flex;
  align-items: center;
  justify-content: center;
  padding: 32px;
}
.container {
  width: 100%;
  max-width: 900px;
  border: 1px solid var(--border);
  border-radius: var(--radius);
  box-shadow: 0 10px 30px rgba(0, 0, 0, 0.35);
  padding: 28px;
}
h1 { margin: 0 0 8px 0; font-size: 28px; }
.sub { color: var(--muted); margin-bottom: 20px; }
.row { display: flex; gap: 12px; align-items: center; }
.grow { flex: 1; }
input[type="password"] {
  width: 100%;
  padding: 14px 16px;
  border-radius: 12px;
  border: 1px solid var(--input-border);
  background: var(--input);
  color: var(--text);
  font-size: 16px;
}
input:focus { border-color: var(--primary); outline: none; }
.btn {
  display: inline-flex;
  align-items: center;
  padding: 12px 16px;
  border-radius: 12px;
  border: 1px solid var(--border);
  background: var(--btn);
  color: var(--text);
  cursor: pointer;
  text-decoration: none;
  font-weight: 600;
}
.btn:hover { background: var(--btn-hover); }
.status { display: flex; align-items: center; gap: 8px; color: var(--muted); font-size: 14px; }
.badge {
  display: inline-block;
  padding: 4px 10px;
  border-radius: 999px;
  font-size: 13px;
  font-weight: 700;
  border: 1px solid var(--border);
  color: var(--muted);
}
.badge.success { color: #1fe1a2; border-color: #1b3f34; background: #0f1c19; }
.badge.danger { color: #ff8b8b; border-color: #4a1f29; background: #1b0f12; }
.list { margin-top: 18px; display: grid; gap: 12px; }
.card { border: 1px solid var(--border); border-radius: 14px; background: var(--card); padding: 16px; }
.card:hover { background: var(--card-hover); }
.title { font-weight: 700; }
.notes, .hint { color: var(--muted); font-size: 14px; }
.err, .msg { padding: 12px 14px; border-radius: 12px; margin: 8px 0; border: 1px solid var(--border); }
.err { background: #1c1214; color: #ffb3b3; border-color: #3b1c22; }
.msg { background: #0f1a15; color: #aef5d6; border-color: #173d31; }
.sp { height: 10px; }
.hr { height: 1px; background: var(--border); margin: 16px 0; }
.footer { margin-top: 18px; display: flex; justify-content: space-between; color: var(--muted); font-size: 13px; }
@media (max-width: 640px) {
  .row { flex-direction: column; align-items: stretch; }
}
"#;
