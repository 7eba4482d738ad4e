//! The hand-written `zr.toml` schema reference printed by `zr validate
//! --schema` (spec.md §4.1). Kept as a constant rather than derived from the
//! raw types so the prose can explain precedence and defaulting, not just
//! field shapes.

pub const SCHEMA: &str = r#"# zr.toml schema reference

[workspace]
members = ["glob", ...]      # directories (relative to this file) scanned for member zr.toml overlays

[tasks.<name>]
cmd = "string"                # shell command; omit only if the task purely composes deps
description = "string"
cwd = "string"                # relative to the member root
deps = ["task", ...]          # may run concurrently with siblings
deps_serial = ["task", ...]   # run strictly before this task, in listed order
env = { KEY = "value" }
timeout = 1000                # milliseconds
retry = { count = 2, backoff = "none" | "linear" | "exponential" }
allow_failure = false
tags = ["tag", ...]
max_concurrent = 1             # cap on simultaneous matrix-expanded instances
max_cpu = 1                     # advisory core budget, used for scheduling admission only
max_memory = 536870912          # advisory byte budget, used for scheduling admission only
condition = "expression"        # evaluated before admission; false skips the task
matrix = { axis = ["value", ...] }
template = "template-name"
template_params = { KEY = "value" }
toolchain = ["tool", ...]
cache = true | { enabled = true, inputs = ["glob", ...], outputs = ["glob", ...], key = "expression" }

[templates.<name>]
# same shape as [tasks.<name>]; referenced via task.template

[cache]
enabled = true
local_dir = ".zr/cache"
[cache.remote]
type = "string"
url = "string"
auth = "string"

[workflows.<name>]
[[workflows.<name>.stages]]
name = "string"
tasks = ["task", ...]
approval = false
fail_fast = false
condition = "expression"
on_failure = "stage-name"       # redirect target; cannot reach back to a predecessor

[profiles.<name>]
cache_enabled = true
env = { KEY = "value" }

[env]
KEY = "value"

# Precedence (lowest to highest): built-in defaults, workspace root file,
# active member file, selected profile, command-line overrides.
# Mappings merge key-wise; sequences replace wholesale when present.
"#;
