//! Fixed code tables published with the registry layout rather than as extracts.

use crate::conversions::code::pad_code;

const COMPANY_SIZES: &[(&str, &str)] = &[
    ("00", "Não informado"),
    ("01", "Micro Empresa"),
    ("03", "Empresa de Pequeno Porte"),
    ("05", "Demais"),
];

const REGISTRATION_STATUSES: &[(&str, &str)] = &[
    ("01", "Nula"),
    ("02", "Ativa"),
    ("03", "Suspensa"),
    ("04", "Inapta"),
    ("08", "Baixada"),
];

const PARTNER_TYPES: &[(&str, &str)] = &[
    ("1", "Pessoa Jurídica"),
    ("2", "Pessoa Física"),
    ("3", "Estrangeiro"),
];

fn find(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, description)| *description)
}

pub fn company_size_description(code: Option<&str>) -> &'static str {
    code.and_then(|code| find(COMPANY_SIZES, &pad_code(code, 2)))
        .unwrap_or("Não informado")
}

pub fn registration_status_description(code: Option<&str>) -> &'static str {
    code.and_then(|code| find(REGISTRATION_STATUSES, &pad_code(code, 2)))
        .unwrap_or("Não informada")
}

/// Partner type codes are matched verbatim, without padding.
pub fn partner_type_description(code: Option<&str>) -> &'static str {
    code.and_then(|code| find(PARTNER_TYPES, code))
        .unwrap_or("Não informado")
}
