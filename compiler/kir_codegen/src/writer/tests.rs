use pretty_assertions::assert_eq;

use super::*;

#[test]
fn fresh_temps_share_one_counter() {
    let mut writer = CodeWriter::new();
    assert_eq!(writer.fresh_temp("var"), "var0");
    assert_eq!(writer.fresh_temp("phi"), "phi1");
    assert_eq!(writer.fresh_temp("var"), "var2");
}

#[test]
fn indent_dedent() {
    let mut writer = CodeWriter::new();
    writer.writeln("line1");
    writer.indent();
    writer.writeln("line2");
    writer.indent();
    writer.writeln("line3");
    writer.dedent();
    writer.writeln("line4");
    writer.dedent();
    writer.writeln("line5");

    assert_eq!(
        writer.take_output(),
        "line1\n    line2\n        line3\n    line4\nline5\n"
    );
}

#[test]
fn write_lines_reindents() {
    let mut writer = CodeWriter::new();
    writer.indent();
    writer.write_lines("a;\n\nif (x) {\n    b;\n}\n");
    assert_eq!(writer.output(), "    a;\n\n    if (x) {\n        b;\n    }\n");
}
