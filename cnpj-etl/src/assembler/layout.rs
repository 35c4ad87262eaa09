//! Positional column layout of the registry extracts read by the assembler.

pub mod empresas {
    pub const COLUMNS: usize = 7;

    pub const CNPJ_BASICO: usize = 0;
    pub const RAZAO_SOCIAL: usize = 1;
    pub const NATUREZA_JURIDICA: usize = 2;
    pub const QUALIFICACAO_RESPONSAVEL: usize = 3;
    pub const CAPITAL_SOCIAL: usize = 4;
    pub const PORTE: usize = 5;
    pub const ENTE_FEDERATIVO: usize = 6;
}

pub mod estabelecimentos {
    pub const COLUMNS: usize = 30;

    pub const CNPJ_BASICO: usize = 0;
    pub const CNPJ_ORDEM: usize = 1;
    pub const CNPJ_DV: usize = 2;
    pub const MATRIZ_FILIAL: usize = 3;
    pub const NOME_FANTASIA: usize = 4;
    pub const SITUACAO_CADASTRAL: usize = 5;
    pub const DATA_SITUACAO_CADASTRAL: usize = 6;
    pub const MOTIVO_SITUACAO: usize = 7;
    pub const PAIS: usize = 9;
    pub const DATA_INICIO_ATIVIDADE: usize = 10;
    pub const CNAE_PRINCIPAL: usize = 11;
    pub const CNAE_SECUNDARIO: usize = 12;
    pub const TIPO_LOGRADOURO: usize = 13;
    pub const LOGRADOURO: usize = 14;
    pub const NUMERO: usize = 15;
    pub const COMPLEMENTO: usize = 16;
    pub const BAIRRO: usize = 17;
    pub const CEP: usize = 18;
    pub const UF: usize = 19;
    pub const MUNICIPIO: usize = 20;
    pub const DDD1: usize = 21;
    pub const TELEFONE1: usize = 22;
    pub const DDD2: usize = 23;
    pub const TELEFONE2: usize = 24;
    pub const DDD_FAX: usize = 25;
    pub const FAX: usize = 26;
    pub const EMAIL: usize = 27;
}

pub mod socios {
    pub const COLUMNS: usize = 11;

    pub const CNPJ_BASICO: usize = 0;
    pub const TIPO_SOCIO: usize = 1;
    pub const NOME: usize = 2;
    pub const DOCUMENTO: usize = 3;
    pub const QUALIFICACAO: usize = 4;
    pub const DATA_ENTRADA: usize = 5;
    pub const PAIS: usize = 6;
    pub const REPRESENTANTE_LEGAL: usize = 7;
    pub const NOME_REPRESENTANTE: usize = 8;
    pub const QUALIFICACAO_REPRESENTANTE: usize = 9;
    pub const FAIXA_ETARIA: usize = 10;
}

pub mod simples {
    pub const COLUMNS: usize = 7;

    pub const CNPJ_BASICO: usize = 0;
    pub const OPCAO_SIMPLES: usize = 1;
    pub const DATA_OPCAO_SIMPLES: usize = 2;
    pub const DATA_EXCLUSAO_SIMPLES: usize = 3;
    pub const OPCAO_MEI: usize = 4;
    pub const DATA_OPCAO_MEI: usize = 5;
    pub const DATA_EXCLUSAO_MEI: usize = 6;
}
