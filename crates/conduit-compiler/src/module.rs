//! Step module wrapper.
//!
//! Every inline code step is materialized as a directory holding the user's
//! `code.js` and a generated `index.js` that adapts it to the step protocol:
//! it prints a `startTime` line before running, an `endTime` line with the
//! result on stdout, or an `endTime` line with the error on stderr. When the
//! step's error policy is `stop`, a failure ends the whole process.

use crate::manifest::StepMeta;

/// File name of the user code inside a step module directory.
pub const STEP_CODE_FILE: &str = "code.js";

/// File name of the generated wrapper inside a step module directory.
pub const STEP_INDEX_FILE: &str = "index.js";

const TEMPLATE: &str = r#"const meta = __META__;

module.exports = {
  run: async function (inputs, info) {
    try {
      console.log(JSON.stringify({ startTime: Date.now(), inputs, info, meta }));
      const code = require("./__CODE__");
      const result = await code(inputs);
      console.log(JSON.stringify({ endTime: Date.now(), result, info, meta }));
      return result;
    } catch (e) {
      console.error(JSON.stringify({ endTime: Date.now(), error: String(e), info, meta }));
      if (info && info.errorPolicy === "stop") {
        process.exit(1);
      }
    }
  },
};
"#;

/// Render the `index.js` wrapper for one inline code step.
pub fn render_step_module(meta: &StepMeta) -> Result<String, serde_json::Error> {
  let meta = serde_json::to_string(meta)?;
  // Meta goes in last so user-supplied text is never substituted again.
  Ok(
    TEMPLATE
      .replace("__CODE__", STEP_CODE_FILE)
      .replace("__META__", &meta),
  )
}
