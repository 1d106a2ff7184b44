//! Reply texts. Markdown is reserved for replies built only from static text
//! and numbers; anything that echoes user or directory data is sent plain.

use crate::assignment::{AssignmentDetails, AssignmentError};
use crate::matcher::DocumentMatch;
use crate::resolver::{DirectorySummary, Resolution, ResolutionOutcome};
use crate::validation::{DocumentType, MAX_CEDULA_LENGTH, MIN_CEDULA_LENGTH, MIN_DOC_LENGTH};
use ce_channels::{MessageFormat, OutboundMessage};
use ce_data::{Agent, CellValue, NewAgent, Row};

const NAME_FIELDS: [&str; 7] = [
    "nombre",
    "name",
    "client_name",
    "razon_social",
    "business_name",
    "company_name",
    "customer_name",
];
const LEGAL_FIELDS: [&str; 4] = [
    "legal_name",
    "representante_legal",
    "rep_legal",
    "legal_representative",
];
const PHONE_FIELDS: [&str; 6] = [
    "phone_number",
    "telefono",
    "phone",
    "celular",
    "movil",
    "contact_phone",
];
const EMAIL_FIELDS: [&str; 4] = ["email", "correo", "mail", "contact_email"];
const ADDRESS_FIELDS: [&str; 5] = [
    "address",
    "direccion",
    "domicilio",
    "ubicacion",
    "street_address",
];
const CITY_FIELDS: [&str; 4] = ["ciudad", "city", "municipio", "locality"];
const STATE_FIELDS: [&str; 4] = ["departamento", "estado", "state", "region"];
const TECHNICAL_FIELDS: [&str; 5] = ["id", "created_at", "updated_at", "status", "active"];
const MAX_FALLBACK_FIELDS: usize = 8;
const MAX_ADDRESS_DISPLAY: usize = 80;
const MAPS_BASE_URL: &str = "https://maps.google.com/maps";
const NEW_SEARCH_HINT: &str = "Nueva busqueda: Escribe 'cliente'";
const RESTART_ASSIGN_HINT: &str = "Escribe 'asignar' para empezar de nuevo.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub format: MessageFormat,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Plain,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: MessageFormat::Markdown,
        }
    }
}

impl From<Reply> for OutboundMessage {
    fn from(reply: Reply) -> Self {
        Self {
            content: reply.text,
            format: reply.format,
        }
    }
}

pub fn start() -> Reply {
    Reply::markdown(
        "🎯 *BUSCADOR DE CLIENTES COMERCIALES* ⚡

Te ayudo a buscar clientes, verificar su *disponibilidad comercial* y gestionar comerciales y órdenes.

*📋 ¿Qué puedo hacer?*
• cliente - Buscar cliente y verificar disponibilidad
• comercial - Registrar un nuevo comercial
• asignar - Asignar una orden a un comercial
• resumen - Ver información del sistema
• info - Ver qué datos obtienes
• help - Ver todos los comandos

*🔍 Puedo buscar por:*
• NIT - Número de Identificación Tributaria
• CC - Cédula de Ciudadanía

*🚦 Estados de cliente:*
• 🟢 DISPONIBLE - Puede crear órdenes
• 🚫 NO DISPONIBLE - Existe pero no puede crear órdenes
• ❌ NO ENCONTRADO - Necesita pre-registro

🚀 *¡Empecemos a buscar clientes!*",
    )
}

pub fn help() -> Reply {
    Reply::plain(format!(
        "COMO USAR EL BUSCADOR COMERCIAL

Buscar Clientes:
• cliente - Empezar busqueda con verificacion comercial
• NIT - Para empresas
• CC - Para personas

Comerciales y ordenes:
• comercial - Registrar un nuevo comercial
• asignar - Asignar una orden (MP-...) a un comercial
• /cancelar - Cancelar el proceso en curso

Informacion:
• resumen - Ver datos del sistema
• info - Detalles sobre que informacion se muestra
• help - Mostrar esta ayuda
• start - Volver al inicio

Proceso paso a paso:
1. Empezar: Escribe 'cliente'
2. Tipo: Selecciona 'NIT' o 'CC'
3. Numero: Escribe el documento (solo numeros)
4. Resultado: Te muestro el estado comercial e informacion

Estados de cliente:
• DISPONIBLE - Cliente puede crear ordenes
• NO DISPONIBLE - Cliente existe pero no puede crear ordenes
• NO ENCONTRADO - Necesita pre-registro

Formatos que acepto:
• NIT: Entre {MIN_DOC_LENGTH} y {nit} numeros
• CC: Entre {MIN_DOC_LENGTH} y {cc} numeros
• Cedula de comercial: Entre {MIN_CEDULA_LENGTH} y {MAX_CEDULA_LENGTH} numeros
• Orden: MP-0003

Ejemplos:
• NIT: 901234567
• CC: 12345678

Para clientes nuevos:
Si no encuentras un cliente, te dare el enlace de pre-registro para crearlo.",
        nit = DocumentType::Nit.max_len(),
        cc = DocumentType::Cc.max_len(),
    ))
}

pub fn info() -> Reply {
    Reply::markdown(
        "ℹ️ *INFORMACIÓN DETALLADA*

Para obtener información completa de un cliente:
1. Usa 'cliente' para buscar
2. El sistema mostrará automáticamente:

*Datos principales:*
• 🔍 Documento de identidad
• 🏢 Nombre/Razón social
• 👤 Representante legal
• 📞 Teléfono de contacto
• 📧 Email corporativo
• 📍 Dirección completa
• 🌆 Ciudad y departamento

*💡 Tip:* Toda la información disponible se muestra automáticamente en cada búsqueda.

🔍 *Para buscar:* Escribe 'cliente'",
    )
}

pub fn search_start() -> Reply {
    Reply::markdown(
        "🔍 *BÚSQUEDA DE CLIENTE* ⚡

*Paso 1/2:* Selecciona el tipo de documento

*Opciones disponibles:*
• *NIT* - Número de Identificación Tributaria
• *CC* - Cédula de Ciudadanía

📝 Escribe exactamente: `NIT` o `CC`",
    )
}

pub fn invalid_document_type(text: &str) -> Reply {
    Reply::plain(format!(
        "❌ Tipo inválido: {text}\n\nOpciones válidas: NIT, CC"
    ))
}

pub fn document_type_selected(doc_type: DocumentType) -> Reply {
    Reply::markdown(format!(
        "📄 *TIPO SELECCIONADO:* {code} ({name}) ✅

*Paso 2/2:* Ingresa el número de documento

*Formato requerido:*
• Solo números (sin puntos, guiones ni espacios)
• Entre {MIN_DOC_LENGTH} y {max} dígitos
• Ejemplo: 901234567

⚡ *El sistema buscará automáticamente* una vez reciba el número.",
        code = doc_type.as_str(),
        name = doc_type.display_name(),
        max = doc_type.max_len(),
    ))
}

pub fn invalid_document_number(error: &str) -> Reply {
    Reply::plain(format!(
        "Formato incorrecto:\n{error}\n\nIntenta nuevamente con solo numeros."
    ))
}

pub fn search_failed() -> Reply {
    Reply::plain(
        "Error al buscar:\nNo pude consultar los datos en este momento.\n\nPor favor intenta en unos minutos.",
    )
}

/// Render a resolver outcome for chat.
pub fn search_result(resolution: &Resolution, preregister_url: &str, max_shown: usize) -> Reply {
    let doc_type = resolution.doc_type.as_str();
    let number = &resolution.doc_number;
    let text = match &resolution.outcome {
        ResolutionOutcome::Unavailable { .. } => format!(
            "CLIENTE EXISTENTE - NO DISPONIBLE

Documento: {doc_type} {number}

Estado: Este cliente EXISTE en el sistema pero NO esta disponible para crear nuevas ordenes en este momento.

Recomendacion: Contacta a tu supervisor o al area comercial para mas informacion sobre este cliente.

{NEW_SEARCH_HINT}"
        ),
        ResolutionOutcome::Available { matches } if matches.len() == 1 => format!(
            "CLIENTE DISPONIBLE!

{info}

Estado: Cliente DISPONIBLE para crear ordenes

Busqueda realizada:
• Tipo: {doc_type}
• Numero: {number}

{NEW_SEARCH_HINT}",
            info = format_client_info(
                &matches[0].row,
                Some(matches[0].matched_column.as_str()),
                &matches[0].column_order,
            ),
        ),
        ResolutionOutcome::Available { matches } => {
            let total = matches.len();
            let mut listing: Vec<String> = matches
                .iter()
                .take(max_shown)
                .enumerate()
                .map(|(index, m)| format!("{}. {}", index + 1, match_headline(m)))
                .collect();
            if total > max_shown {
                listing.push(format!("... y {} mas", total - max_shown));
            }
            format!(
                "VARIOS CLIENTES DISPONIBLES! ({total})

Documento buscado: {doc_type} {number}
Estado: Clientes DISPONIBLES para crear ordenes
Resultado: Se encontraron {total} clientes con este documento

{listing}

{NEW_SEARCH_HINT}",
                listing = listing.join("\n"),
            )
        }
        ResolutionOutcome::NotFound { total_searched } => format!(
            "CLIENTE NO ENCONTRADO

Lo que busque:
• Tipo de documento: {doc_type}
• Numero: {number}
• Clientes consultados: {searched}

Que hacer ahora?

CREAR NUEVO CLIENTE:
Para registrar este cliente usa el siguiente enlace:

{preregister}

Pasos:
1. Hacer clic en el enlace de arriba
2. Completar el formulario de pre-registro
3. Una vez registrado, podras crear ordenes

{NEW_SEARCH_HINT}",
            searched = group_thousands(*total_searched),
            preregister = if preregister_url.is_empty() {
                "(enlace de pre-registro no configurado)"
            } else {
                preregister_url
            },
        ),
    };
    Reply::plain(text)
}

fn match_headline(m: &DocumentMatch) -> String {
    let document = m.matched_value.to_display_string();
    match first_present(&m.row, &NAME_FIELDS) {
        Some(name) => format!("{name} ({document})"),
        None => document,
    }
}

fn first_present(row: &Row, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        row.get(field)
            .filter(|value| value.has_value())
            .map(|value| value.to_display_string())
    })
}

/// Client card: the matched document, then the first present value of each
/// known field group. Rows with none of those show up to eight raw fields,
/// in `column_order` when given.
pub fn format_client_info(row: &Row, matched_column: Option<&str>, column_order: &[String]) -> String {
    let mut lines = Vec::new();
    if let Some(value) = matched_column.and_then(|column| row.get(column)) {
        lines.push(format!("🔍 Documento: {value}"));
    }
    let header_lines = lines.len();

    let name = first_present(row, &NAME_FIELDS);
    let legal = first_present(row, &LEGAL_FIELDS);
    let phone = first_present(row, &PHONE_FIELDS);
    let email = first_present(row, &EMAIL_FIELDS);
    let address = first_present(row, &ADDRESS_FIELDS);
    let city = first_present(row, &CITY_FIELDS);
    let state = first_present(row, &STATE_FIELDS);

    if let Some(name) = &name {
        lines.push(format!("🏢 Nombre: {name}"));
    }
    if let Some(legal) = &legal {
        lines.push(format!("👤 Representante Legal: {legal}"));
    }
    if let Some(phone) = &phone {
        lines.push(format!("📞 Teléfono: {phone}"));
    }
    if let Some(email) = &email {
        lines.push(format!("📧 Email: {email}"));
    }
    if let Some(address) = &address {
        lines.push(format!("📍 Dirección: {}", truncate_chars(address, MAX_ADDRESS_DISPLAY)));
        if let Some(url) = maps_link(address, city.as_deref(), state.as_deref()) {
            lines.push(format!("🗺️ Mapa: {url}"));
        }
    }
    if let Some(city) = &city {
        lines.push(format!("🌆 Ciudad: {city}"));
    }
    if let Some(state) = &state {
        lines.push(format!("🗺️ Departamento: {state}"));
    }

    if lines.len() == header_lines {
        lines.extend(
            ordered_fields(row, column_order)
                .filter(|(key, value)| {
                    value.has_value()
                        && !value.to_display_string().trim().is_empty()
                        && !TECHNICAL_FIELDS.contains(&key.to_lowercase().as_str())
                })
                .take(MAX_FALLBACK_FIELDS)
                .map(|(key, value)| format!("• {key}: {value}")),
        );
    }

    let available: Vec<&str> = [
        (name.is_some(), "Nombre"),
        (legal.is_some(), "Rep. Legal"),
        (phone.is_some(), "Teléfono"),
        (email.is_some(), "Email"),
        (address.is_some(), "Dirección"),
        (city.is_some(), "Ciudad"),
    ]
    .into_iter()
    .filter_map(|(present, label)| present.then_some(label))
    .collect();
    if !available.is_empty() {
        lines.push(format!("\n✅ Datos disponibles: {}", available.join(", ")));
    }

    if lines.is_empty() {
        "ℹ️ Cliente encontrado (información limitada)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Row fields in dataset column order, then any the column list lacks.
fn ordered_fields<'a>(
    row: &'a Row,
    column_order: &'a [String],
) -> impl Iterator<Item = (&'a str, &'a CellValue)> {
    let listed = column_order
        .iter()
        .filter_map(|column| row.get(column).map(|value| (column.as_str(), value)));
    let unlisted = row
        .iter()
        .filter(|(key, _)| !column_order.iter().any(|column| column == key));
    listed.chain(unlisted)
}

fn maps_link(address: &str, city: Option<&str>, state: Option<&str>) -> Option<String> {
    let mut full = address.to_string();
    for part in [city, state].into_iter().flatten() {
        full.push_str(", ");
        full.push_str(part);
    }
    full.push_str(", Colombia");
    reqwest::Url::parse_with_params(MAPS_BASE_URL, [("q", full.as_str())])
        .ok()
        .map(String::from)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// `1234567` → `1,234,567`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn stats(summary: &DirectorySummary) -> Reply {
    let total = group_thousands(summary.total_clients);
    let cached = if summary.cached {
        "📋 Desde memoria"
    } else {
        "✅ Sí"
    };
    Reply::markdown(format!(
        "📊 *INFORMACIÓN DEL SISTEMA* ⚡

*📈 Resumen:*
• Total de clientes: {total}
• Información actualizada: {cached}

*🔍 ¿Qué puedo buscar?*
• Clientes por NIT (empresas)
• Clientes por Cédula (personas)
• Información completa de contacto
• Datos de ubicación

💡 *Para buscar un cliente:* Escribe `cliente`"
    ))
}

pub fn stats_failed() -> Reply {
    Reply::plain("❌ No pude obtener la información en este momento.\nIntenta nuevamente en unos minutos.")
}

pub fn unknown_command(text: &str) -> Reply {
    let lower = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let suggestion = if has_any(&["cliente", "buscar", "encontrar", "search"]) {
        "Escribe 'cliente' para buscar un cliente"
    } else if has_any(&["nit", "cedula", "documento"]) {
        "Escribe 'cliente' primero, luego elige el tipo de documento"
    } else if has_any(&["comercial", "registrar"]) {
        "Escribe 'comercial' para registrar un comercial"
    } else if has_any(&["orden", "asignar", "pedido"]) {
        "Escribe 'asignar' para asignar una orden"
    } else if has_any(&["estadistica", "resumen", "info"]) {
        "Escribe 'resumen' para ver información del sistema"
    } else {
        "Escribe 'help' para ver qué puedo hacer"
    };
    Reply::plain(format!(
        "❓ No entendí: {text}

💡 Sugerencia: {suggestion}

📋 Lo que puedo hacer:
• cliente - Buscar un cliente
• comercial - Registrar un comercial
• asignar - Asignar una orden
• resumen - Ver información general
• help - Ver todos los comandos"
    ))
}

pub fn cancelled() -> Reply {
    Reply::plain("Proceso cancelado. Escribe 'help' para ver las opciones.")
}

pub fn nothing_to_cancel() -> Reply {
    Reply::plain("No tienes ningun proceso en curso.")
}

pub fn invalid_state() -> Reply {
    Reply::plain("Estado de conversacion invalido. Usa 'cliente' para reiniciar.")
}

pub fn remote_failure() -> Reply {
    Reply::plain(
        "Hubo un problema:\nNo pude comunicarme con el sistema en este momento.\n\nIntenta nuevamente en unos minutos.",
    )
}

pub fn format_agent_info(agent: &Agent) -> String {
    let or_na = |value: &Option<String>| {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("N/A")
            .to_string()
    };
    let registered = agent
        .created_at
        .as_deref()
        .map(|ts| ts.chars().take(10).collect::<String>())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "👤 Nombre: {}\n🪪 Cédula: {}\n📧 Email: {}\n📞 Teléfono: {}\n📅 Registrado: {}",
        or_na(&agent.name),
        agent.cedula,
        or_na(&agent.email),
        or_na(&agent.phone),
        registered,
    )
}

pub fn create_agent_start() -> Reply {
    Reply::plain(format!(
        "👤 REGISTRO DE COMERCIAL

Paso 1/4: Escribe la cédula del comercial ({MIN_CEDULA_LENGTH} a {MAX_CEDULA_LENGTH} dígitos).

Para cancelar escribe /cancelar"
    ))
}

pub fn agent_already_registered(agent: &Agent) -> Reply {
    Reply::plain(format!(
        "⚠️ COMERCIAL YA REGISTRADO

{}

No se creó un nuevo registro.",
        format_agent_info(agent)
    ))
}

pub fn ask_email() -> Reply {
    Reply::plain("✅ Cédula disponible.\n\nPaso 2/4: Escribe el email del comercial.")
}

pub fn ask_name() -> Reply {
    Reply::plain("Paso 3/4: Escribe el nombre completo del comercial.")
}

pub fn ask_phone() -> Reply {
    Reply::plain("Paso 4/4: Escribe el teléfono del comercial.")
}

pub fn invalid_field(error: &str) -> Reply {
    Reply::plain(format!("❌ {error}\n\nIntenta nuevamente."))
}

pub fn confirm_agent(agent: &NewAgent) -> Reply {
    Reply::plain(format!(
        "📋 CONFIRMA LOS DATOS

🪪 Cédula: {}
📧 Email: {}
👤 Nombre: {}
📞 Teléfono: {}

Responde 'si' para crear el comercial o 'no' para cancelar.",
        agent.cedula, agent.email, agent.name, agent.phone
    ))
}

pub fn confirmation_reprompt() -> Reply {
    Reply::plain("No entendí tu respuesta. Responde 'si' para confirmar o 'no' para cancelar.")
}

pub fn agent_created(agent: &Agent) -> Reply {
    let name = agent.name.as_deref().unwrap_or(&agent.cedula);
    Reply::plain(format!(
        "✅ COMERCIAL CREADO: {name}

{}",
        format_agent_info(agent)
    ))
}

pub fn agent_duplicate(cedula: &str) -> Reply {
    Reply::plain(format!(
        "⚠️ Ya existe un comercial con la cédula {cedula}. No se creó un nuevo registro."
    ))
}

pub fn assign_start() -> Reply {
    Reply::plain(
        "📦 ASIGNACIÓN DE ORDEN

Paso 1/3: Escribe la cédula del comercial.

Para cancelar escribe /cancelar",
    )
}

pub fn agent_not_found(cedula: &str) -> Reply {
    Reply::plain(format!(
        "❌ No hay un comercial registrado con la cédula {cedula}.\n\nEscribe otra cédula o /cancelar."
    ))
}

pub fn ask_order_number(agent: &Agent) -> Reply {
    let name = agent.name.as_deref().unwrap_or(&agent.cedula);
    Reply::plain(format!(
        "✅ Comercial: {name}\n\nPaso 2/3: Escribe el número de orden (ejemplo: MP-0003)."
    ))
}

pub fn order_not_found(order_number: &str) -> Reply {
    Reply::plain(format!(
        "❌ La orden {order_number} no existe.\n\nEscribe otro número de orden o /cancelar."
    ))
}

pub fn confirm_assignment(order_number: &str, agent_name: &str, cedula: &str) -> Reply {
    Reply::plain(format!(
        "📋 CONFIRMA LA ASIGNACIÓN

📦 Orden: {order_number}
👤 Comercial: {agent_name} ({cedula})

Responde 'si' para asignar o 'no' para cancelar."
    ))
}

pub fn assignment_done(details: &AssignmentDetails) -> Reply {
    Reply::plain(format!(
        "✅ ORDEN ASIGNADA

📦 Orden: {}
👤 Comercial: {} ({})",
        details.order_number,
        details.agent_name.as_deref().unwrap_or("N/A"),
        details.agent_cedula,
    ))
}

/// The dialog is already closed when this is sent, so no variant asks for
/// another answer.
pub fn assignment_failed(error: &AssignmentError) -> Reply {
    let reason = match error {
        AssignmentError::AgentNotFound { cedula } => {
            format!("El comercial con cédula {cedula} ya no está registrado.")
        }
        AssignmentError::OrderNotFound { order_number } => {
            format!("La orden {order_number} ya no existe.")
        }
        AssignmentError::InvalidOrderNumber(e) => e.message().to_string(),
        AssignmentError::AgentLookup(_)
        | AssignmentError::OrderLookup(_)
        | AssignmentError::Create(_) => {
            "No pude comunicarme con el sistema en este momento.".to_string()
        }
    };
    Reply::plain(format!("❌ ORDEN NO ASIGNADA\n\n{reason}\n\n{RESTART_ASSIGN_HINT}"))
}

#[cfg(test)]
mod tests {
    use super::{format_agent_info, format_client_info, group_thousands, unknown_command};
    use ce_data::{Agent, CellValue, Row};

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (*k, CellValue::from(*v))).collect()
    }

    #[test]
    fn client_card_uses_first_present_field_of_each_group() {
        let row = row(&[
            ("nit", "901234567"),
            ("name", "ignored"),
            ("nombre", "ACME SAS"),
            ("telefono", ""),
            ("celular", "3001234567"),
            ("direccion", "Calle 1 # 2-3"),
            ("ciudad", "Bogotá"),
        ]);
        let card = format_client_info(&row, Some("nit"), &[]);
        assert!(card.starts_with("🔍 Documento: 901234567"));
        assert!(card.contains("🏢 Nombre: ACME SAS"));
        assert!(!card.contains("ignored"));
        assert!(card.contains("📞 Teléfono: 3001234567"));
        assert!(card.contains("https://maps.google.com/maps?q=Calle+1+%23+2-3%2C+Bogot%C3%A1%2C+Colombia"));
        assert!(card.ends_with("✅ Datos disponibles: Nombre, Teléfono, Dirección, Ciudad"));
    }

    #[test]
    fn client_card_falls_back_to_raw_fields() {
        let row = row(&[
            ("id", "7"),
            ("nit", "901234567"),
            ("sector", "Retail"),
            ("status", "active"),
        ]);
        let card = format_client_info(&row, Some("nit"), &[]);
        assert_eq!(card, "🔍 Documento: 901234567\n• nit: 901234567\n• sector: Retail");
    }

    #[test]
    fn raw_fields_follow_dataset_column_order() {
        let row = row(&[
            ("zona", "Norte"),
            ("nit", "901234567"),
            ("asesor", "Luis"),
            ("categoria", "Oro"),
        ]);
        let order: Vec<String> = ["zona", "nit", "categoria"]
            .into_iter()
            .map(String::from)
            .collect();
        let card = format_client_info(&row, Some("nit"), &order);
        assert_eq!(
            card,
            "🔍 Documento: 901234567\n• zona: Norte\n• nit: 901234567\n• categoria: Oro\n• asesor: Luis"
        );
    }

    #[test]
    fn long_addresses_are_truncated_for_display() {
        let long = "A".repeat(90);
        let card = format_client_info(&row(&[("address", long.as_str())]), None, &[]);
        assert!(card.contains(&format!("📍 Dirección: {}...", "A".repeat(80))));
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn unknown_command_suggests_by_keyword() {
        assert!(unknown_command("quiero buscar algo").text.contains("'cliente' para buscar"));
        assert!(unknown_command("mi cedula").text.contains("luego elige el tipo"));
        assert!(unknown_command("ver resumen").text.contains("'resumen'"));
        assert!(unknown_command("xyz").text.contains("'help'"));
    }

    #[test]
    fn agent_card_shows_registration_date() {
        let agent = Agent {
            id: "1".into(),
            cedula: "12345678".into(),
            email: Some("ana@empresa.com".into()),
            name: Some("Ana Pérez".into()),
            phone: None,
            created_at: Some("2024-05-01T10:00:00Z".into()),
        };
        let card = format_agent_info(&agent);
        assert!(card.contains("Nombre: Ana Pérez"));
        assert!(card.contains("Teléfono: N/A"));
        assert!(card.contains("Registrado: 2024-05-01"));
    }
}
