use std::path::Path;

use cnpj_etl::test_utils::fixtures::{
    establishment_row, registry_lines, registry_lines_owned, write_zip,
};

/// Writes every reference table of the sample registry.
pub fn write_lookups(dir: &Path) {
    write_zip(
        dir,
        "Naturezas.zip",
        &registry_lines([["2062", "Sociedade Empresária Limitada"], ["2135", "Empresário (Individual)"]]),
    );
    write_zip(
        dir,
        "Qualificacoes.zip",
        &registry_lines([["49", "Sócio-Administrador"], ["05", "Administrador"]]),
    );
    write_zip(dir, "Cnaes.zip", &registry_lines([["6201501", "Desenvolvimento de programas"]]));
    write_zip(dir, "Municipios.zip", &registry_lines([["7107", "SAO PAULO"]]));
    write_zip(dir, "Paises.zip", &registry_lines([["105", "BRASIL"]]));
    write_zip(dir, "Motivos.zip", &registry_lines([["01", "EXTINCAO POR ENCERRAMENTO"]]));
}

/// Two companies sorted by key: `12345678` with three establishments, a partner and two
/// Simples rows, and `87654321` with none.
pub fn write_sample_registry(dir: &Path) {
    write_lookups(dir);

    write_zip(
        dir,
        "Empresas0.zip",
        &registry_lines([
            ["12345678", "ACME COMERCIO LTDA", "2062", "49", "1.234,56", "01", ""],
            ["87654321", "JOSE DA SILVA", "2135", "50", "0,00", "", ""],
        ]),
    );

    let mut headquarters = establishment_row("12345678", "0003", "10", true);
    headquarters[11] = "6201501".to_string();
    headquarters[20] = "7107".to_string();
    headquarters[21] = "11".to_string();
    headquarters[22] = "30001000".to_string();
    headquarters[27] = "Contato@Acme.com.BR".to_string();
    let second_branch = establishment_row("12345678", "0002", "20", false);
    let first_branch = establishment_row("12345678", "0001", "30", false);
    write_zip(
        dir,
        "Estabelecimentos0.zip",
        &registry_lines_owned(&[headquarters, second_branch, first_branch]),
    );

    write_zip(
        dir,
        "Socios0.zip",
        &registry_lines([[
            "12345678",
            "2",
            "MARIA SOUZA",
            "***123456**",
            "49",
            "20150101",
            "",
            "***000000**",
            "",
            "00",
            "4",
        ]]),
    );

    write_zip(
        dir,
        "Simples.zip",
        &registry_lines([
            ["12345678", "S", "20070701", "20101231", "N", "00000000", "00000000"],
            ["12345678", "N", "20070701", "20111231", "N", "00000000", "00000000"],
        ]),
    );
}
