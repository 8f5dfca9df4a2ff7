//! Packaging compiled code lines for the game: a `/give` command for a
//! container whose slots each hold one template item.

use log::debug;
use serde::Serialize;

use crate::error::AppError;
use crate::schema::ActionSchema;
use crate::settings::CompilerSettings;
use crate::template::Program;

/// Slots in a single container.
pub const MAX_TEMPLATES: usize = 27;

const TEMPLATE_DATA_VERSION: u32 = 1;

/// Payload of the `hypercube:codetemplatedata` tag, in wire field order.
#[derive(Serialize)]
struct TemplateData<'a> {
    author: &'a str,
    name: &'a str,
    version: u32,
    code: &'a str,
}

fn template_item(slot: usize, code: &str, settings: &CompilerSettings) -> Result<String, AppError> {
    let data = serde_json::to_string(&TemplateData {
        author: &settings.author,
        name: &settings.template_name,
        version: TEMPLATE_DATA_VERSION,
        code,
    })
    .map_err(|e| AppError::Delivery {
        message: e.to_string(),
    })?;

    Ok(format!(
        r#"{{id: "{item}", Slot: {slot}b, Count:1b, tag:{{display:{{Name:'{{"text":"Template #{number}", "color": "aqua"}}'}}, PublicBukkitValues:{{"hypercube:codetemplatedata":'{data}'}}}}}}"#,
        item = settings.template_item,
        number = slot + 1,
    ))
}

/// Encode every code line of `program`.
pub fn template_codes(program: &Program, schema: &ActionSchema) -> Result<Vec<String>, AppError> {
    Ok(program.encode_all(schema)?)
}

/// Build the `/give` command carrying every code line of `program`.
pub fn give_command(
    program: &Program,
    schema: &ActionSchema,
    settings: &CompilerSettings,
) -> Result<String, AppError> {
    if program.lines.len() > MAX_TEMPLATES {
        return Err(AppError::Delivery {
            message: format!(
                "Program has {} code lines but a container holds at most {MAX_TEMPLATES}",
                program.lines.len()
            ),
        });
    }

    let items = template_codes(program, schema)?
        .iter()
        .enumerate()
        .map(|(slot, code)| template_item(slot, code, settings))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("packed {} templates into {}", items.len(), settings.container_item);

    Ok(format!(
        r#"/give @p {container}{{BlockEntityTag:{{Items:[{items}]}}, display:{{Name:'[{{"text": "{name}", "color": "light_purple", "italic": "false"}}]'}}}}"#,
        container = settings.container_item,
        items = items.join(","),
        name = settings.program_name,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::schema::tests::fixture;
    use crate::template::{encode, Codeline};

    fn program(src: &str) -> Program {
        crate::dsl::compile(src, &fixture()).unwrap()
    }

    #[test]
    fn give_command_wraps_each_line() {
        let schema = fixture();
        let program = program("func a() { var x: num = 1; }\nfunc b() { var y: num = 2; }");
        let cmd = give_command(&program, &schema, &CompilerSettings::default()).unwrap();

        assert!(cmd.starts_with("/give @p minecraft:shulker_box{BlockEntityTag:{Items:[{id: \"minecraft:ender_chest\", Slot: 0b"));
        assert!(cmd.contains(r#"Slot: 1b, Count:1b, tag:{display:{Name:'{"text":"Template #2", "color": "aqua"}'}"#));
        assert!(cmd.contains(r#"'{"author":"DFCompiler","name":"&bDFCompiler Template","version":1,"code":"H4sI"#));
        assert!(cmd.ends_with(r#"display:{Name:'[{"text": "DFCompiler Program", "color": "light_purple", "italic": "false"}]'}}"#));
    }

    #[test]
    fn embedded_code_decodes_to_line_json() {
        let schema = fixture();
        let program = program("func main() { var x: num = 1 + 2; }");
        let cmd = give_command(&program, &schema, &CompilerSettings::default()).unwrap();

        let start = cmd.find("\"code\":\"").unwrap() + "\"code\":\"".len();
        let len = cmd[start..].find('"').unwrap();
        let decoded = encode::decode(&cmd[start..start + len]).unwrap();
        assert_eq!(decoded, program.lines[0].to_json(&schema).unwrap());
    }

    #[test]
    fn settings_rename_items() {
        let settings = CompilerSettings {
            container_item: "minecraft:barrel".into(),
            program_name: "Parkour".into(),
            ..CompilerSettings::default()
        };
        let cmd = give_command(&Program::default(), &fixture(), &settings).unwrap();
        assert_eq!(
            cmd,
            r#"/give @p minecraft:barrel{BlockEntityTag:{Items:[]}, display:{Name:'[{"text": "Parkour", "color": "light_purple", "italic": "false"}]'}}"#
        );
    }

    #[test]
    fn too_many_lines_rejected() {
        let program = Program {
            lines: vec![Codeline::default(); MAX_TEMPLATES + 1],
        };
        let err = give_command(&program, &fixture(), &CompilerSettings::default()).unwrap_err();
        assert!(matches!(err, AppError::Delivery { .. }));
    }
}
